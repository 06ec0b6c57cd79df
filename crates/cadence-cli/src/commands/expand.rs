use anyhow::Result;
use cadence_core::helper::RecurrenceSetHelper;
use cadence_core::models::Occurrence;
use owo_colors::OwoColorize;
use tracing::debug;

use crate::cli::ExpandCommand;
use crate::config::Config;
use crate::parser::parse_date_arg;
use crate::util::{input_timezone, load_set};
use crate::views::table::{display_occurrences, ViewOccurrence};

pub fn expand(command: ExpandCommand, config: &Config) -> Result<()> {
    let tz = input_timezone(command.input.timezone.as_deref(), config)?;
    let set = load_set(&command.input.file, tz)?;

    let after = command.after.as_deref().map(|s| parse_date_arg(s, tz)).transpose()?;
    let before = command.before.as_deref().map(|s| parse_date_arg(s, tz)).transpose()?;
    let limit = command
        .limit
        .map_or(config.max_occurrences, |limit| limit.min(config.max_occurrences));

    let occurrences = collect_window(&set, after, before, limit);
    debug!(count = occurrences.len(), limit, "expanded recurrence set");

    if command.json {
        println!("{}", serde_json::to_string_pretty(&occurrences)?);
        return Ok(());
    }

    let views: Vec<ViewOccurrence> = occurrences
        .iter()
        .map(|dt| ViewOccurrence {
            at: *dt,
            all_day: set.is_all_day(),
            is_dtstart: set.dtstart() == Some(*dt),
            is_rdate: set.rdates().contains(dt),
        })
        .collect();
    display_occurrences(&views, config.display_tz());

    if command.limit.is_none() && occurrences.len() == config.max_occurrences {
        eprintln!(
            "{} Output stopped at max_occurrences ({}); pass --limit or --before to narrow it.",
            "Note:".yellow().bold(),
            config.max_occurrences
        );
    }

    Ok(())
}

/// Occurrences within the inclusive `[after, before]` window, at most `limit`.
pub fn collect_window(
    set: &RecurrenceSetHelper,
    after: Option<Occurrence>,
    before: Option<Occurrence>,
    limit: usize,
) -> Vec<Occurrence> {
    set.collection()
        .iter()
        .skip_while(|dt| after.is_some_and(|after| *dt < after))
        .take_while(|dt| before.map_or(true, |before| *dt <= before))
        .take(limit)
        .collect()
}
