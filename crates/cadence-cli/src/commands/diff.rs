use anyhow::{Context, Result};
use cadence_core::analyzer::ChangeAnalyzer;

use crate::cli::DiffCommand;
use crate::config::Config;
use crate::util::{input_timezone, read_lines};
use crate::views::table::display_analysis;

pub fn diff(command: DiffCommand, config: &Config) -> Result<()> {
    if command.old == "-" && command.new == "-" {
        anyhow::bail!("Only one side of a diff can be read from stdin");
    }
    let tz = input_timezone(command.timezone.as_deref(), config)?;
    let old = read_lines(&command.old)?;
    let new = read_lines(&command.new)?;

    let analysis = ChangeAnalyzer::new(tz)
        .analyze(&old, &new)
        .context("Failed to analyze recurrence change")?;

    if command.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        display_analysis(&analysis, config.display_tz());
    }

    Ok(())
}
