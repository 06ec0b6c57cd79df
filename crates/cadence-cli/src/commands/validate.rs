use anyhow::Result;
use cadence_core::error::CoreError;
use owo_colors::OwoColorize;

use crate::cli::ValidateCommand;
use crate::config::Config;
use crate::timezone::format_occurrence;
use crate::util::{input_timezone, load_set};

pub fn validate(command: ValidateCommand, config: &Config) -> Result<()> {
    let tz = input_timezone(command.input.timezone.as_deref(), config)?;
    let set = load_set(&command.input.file, tz)?;
    let display_tz = config.display_tz();

    match set.validate_dtstart_alignment(command.ignore_exdate) {
        Ok(()) => {
            let dtstart = set
                .dtstart()
                .map(|dt| format_occurrence(dt, display_tz, set.is_all_day()))
                .unwrap_or_default();
            println!("{} DTSTART {} is the first occurrence", "✓".green(), dtstart);
            Ok(())
        }
        Err(CoreError::Alignment(err)) => {
            if let Some(first) = err.actual_first() {
                println!(
                    "{} {}",
                    "Suggested DTSTART:".yellow(),
                    format_occurrence(first, display_tz, set.is_all_day())
                );
            }
            Err(CoreError::Alignment(err).into())
        }
        Err(other) => Err(other.into()),
    }
}
