use anyhow::Result;
use cadence_core::timezone::utc_now;
use owo_colors::OwoColorize;

use crate::cli::NextCommand;
use crate::config::Config;
use crate::parser::parse_date_arg;
use crate::timezone::format_occurrence;
use crate::util::{input_timezone, load_set};

pub fn next(command: NextCommand, config: &Config) -> Result<()> {
    let tz = input_timezone(command.input.timezone.as_deref(), config)?;
    let set = load_set(&command.input.file, tz)?;

    let after = match command.after.as_deref() {
        Some(s) => parse_date_arg(s, tz)?,
        None => utc_now(),
    };
    let count = command.count.unwrap_or(config.preview_count);

    let occurrences = if command.include_dtstart {
        set.next_n_including_dtstart(after, count)
    } else {
        set.next_n(after, count)
    };

    if occurrences.is_empty() {
        println!("No upcoming occurrences (the recurrence may have ended)");
        return Ok(());
    }

    println!("{} (next {} occurrences)", "Upcoming".blue().bold(), occurrences.len());
    println!();

    let display_tz = config.display_tz();
    for (i, occurrence) in occurrences.iter().enumerate() {
        let formatted = format_occurrence(*occurrence, display_tz, set.is_all_day());
        let marker = if set.rdates().contains(occurrence) {
            " (RDATE)".cyan().to_string()
        } else if set.dtstart() == Some(*occurrence) {
            " (DTSTART)".green().to_string()
        } else {
            String::new()
        };
        println!("  {}. {}{}", i + 1, formatted, marker);
    }

    Ok(())
}
