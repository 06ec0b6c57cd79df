use std::path::Path;

use cadence_core::timezone::resolve_timezone;
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Settings read from `cadence.toml`, an optional `--config` file and
/// `CADENCE_*` environment variables, in that order of precedence.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Zone for floating date-times and date arguments (IANA format)
    pub default_timezone: String,
    /// Zone occurrences are shown in; each occurrence's own zone when unset
    #[serde(default)]
    pub display_timezone: Option<String>,
    /// Occurrences shown by `next` when `-n` is not given
    pub preview_count: usize,
    /// Hard cap on occurrences listed by `expand`
    pub max_occurrences: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timezone: detect_system_timezone(),
            display_timezone: None,
            preview_count: 10,
            max_occurrences: 1000,
        }
    }
}

impl Config {
    /// Loads the configuration, merging `extra` over `cadence.toml` when given.
    pub fn load(extra: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("cadence.toml"));
        if let Some(path) = extra {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment.merge(Env::prefixed("CADENCE_")).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), figment::Error> {
        resolve_timezone(&self.default_timezone)
            .map_err(|e| figment::Error::from(e.to_string()))?;
        if let Some(display) = &self.display_timezone {
            resolve_timezone(display).map_err(|e| figment::Error::from(e.to_string()))?;
        }
        Ok(())
    }

    pub fn default_tz(&self) -> Tz {
        resolve_timezone(&self.default_timezone).unwrap_or(Tz::UTC)
    }

    pub fn display_tz(&self) -> Option<Tz> {
        self.display_timezone
            .as_deref()
            .and_then(|name| resolve_timezone(name).ok())
    }
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if !tz.is_empty() && resolve_timezone(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(tz) = iana_time_zone::get_timezone() {
        if resolve_timezone(&tz).is_ok() {
            return tz;
        }
    }

    "UTC".to_string()
}
