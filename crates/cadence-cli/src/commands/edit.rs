use anyhow::{bail, Result};
use cadence_core::helper::RecurrenceSetHelper;
use chrono_tz::Tz;
use owo_colors::OwoColorize;

use crate::cli::EditCommand;
use crate::config::Config;
use crate::parser::parse_date_arg;
use crate::util::{input_timezone, load_set, write_lines};

pub fn edit(command: EditCommand, config: &Config) -> Result<()> {
    if command.write && command.input.file == "-" {
        bail!("Cannot write back to stdin; redirect the output instead");
    }

    let tz = input_timezone(command.input.timezone.as_deref(), config)?;
    let mut set = load_set(&command.input.file, tz)?;
    let changes = apply_edits(&mut set, &command, tz)?;
    let lines = set.to_lines();

    if command.write {
        write_lines(&command.input.file, &lines)?;
        println!(
            "{} Applied {} change(s) to {}",
            "✓".green(),
            changes,
            command.input.file
        );
    } else {
        for line in &lines {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Applies every requested mutation, returning how many were requested.
pub fn apply_edits(set: &mut RecurrenceSetHelper, command: &EditCommand, tz: Tz) -> Result<usize> {
    let mut changes = 0;

    for date in &command.remove_rdate {
        set.remove_rdate(parse_date_arg(date, tz)?)?;
        changes += 1;
    }
    for date in &command.add_rdate {
        set.add_rdate(parse_date_arg(date, tz)?)?;
        changes += 1;
    }
    for date in &command.remove_exdate {
        set.remove_exdate(parse_date_arg(date, tz)?)?;
        changes += 1;
    }
    for date in &command.add_exdate {
        set.add_exdate(parse_date_arg(date, tz)?)?;
        changes += 1;
    }

    if let Some(until) = &command.until {
        set.update_until(parse_date_arg(until, tz)?)?;
        changes += 1;
    }
    if let Some(count) = command.count {
        set.update_count(count)?;
        changes += 1;
    }

    Ok(changes)
}
