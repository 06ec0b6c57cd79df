use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use cadence_core::helper::RecurrenceSetHelper;
use chrono_tz::Tz;

use crate::config::Config;

/// Reads recurrence lines from a file, or from stdin when `path` is `-`.
pub fn read_lines(path: &str) -> Result<Vec<String>> {
    let text = if path == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read recurrence from stdin")?;
        buffer
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path))?
    };

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Writes serialized recurrence lines back to `path`.
pub fn write_lines(path: &str, lines: &[String]) -> Result<()> {
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(path, text).with_context(|| format!("Failed to write '{}'", path))
}

/// The zone floating values are read in: `--timezone`, else the configured default.
pub fn input_timezone(explicit: Option<&str>, config: &Config) -> Result<Tz> {
    match explicit {
        Some(name) => Ok(cadence_core::timezone::resolve_timezone(name)?),
        None => Ok(config.default_tz()),
    }
}

/// Loads a recurrence set from a file argument.
pub fn load_set(path: &str, tz: Tz) -> Result<RecurrenceSetHelper> {
    let lines = read_lines(path)?;
    RecurrenceSetHelper::from_lines(&lines, tz)
        .with_context(|| format!("Invalid recurrence in '{}'", path))
}
