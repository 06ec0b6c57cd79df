use cadence_core::models::{ChangeAnalysis, ChangeType, Occurrence};
use chrono::Utc;
use chrono_humanize::Humanize;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};

use crate::timezone::{format_occurrence, format_offset};

#[derive(Debug, Clone)]
pub struct ViewOccurrence {
    pub at: Occurrence,
    pub all_day: bool,
    pub is_dtstart: bool,
    pub is_rdate: bool,
}

pub fn display_occurrences(occurrences: &[ViewOccurrence], display_tz: Option<Tz>) {
    if occurrences.is_empty() {
        println!("No occurrences found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Occurrence", "Day", "Offset", "Relative"]);

    let now = Utc::now();
    for (i, occurrence) in occurrences.iter().enumerate() {
        let mut row = Row::new();
        row.add_cell(Cell::new(i + 1));

        let mut label = format_occurrence(occurrence.at, display_tz, occurrence.all_day);
        if occurrence.is_dtstart {
            label.push_str(" (DTSTART)");
        }
        if occurrence.is_rdate {
            label.push_str(" (RDATE)");
        }
        let mut at_cell = Cell::new(label);
        if occurrence.is_rdate {
            at_cell = at_cell.fg(Color::Cyan);
        }
        if occurrence.is_dtstart {
            at_cell = at_cell.add_attribute(Attribute::Bold);
        }
        row.add_cell(at_cell);

        let weekday = match display_tz {
            Some(tz) if !occurrence.all_day => occurrence.at.with_timezone(&tz).format("%a"),
            _ => occurrence.at.format("%a"),
        };
        row.add_cell(Cell::new(weekday.to_string()));
        row.add_cell(Cell::new(if occurrence.all_day {
            "-".to_string()
        } else {
            format_offset(occurrence.at, display_tz)
        }));

        let relative = Cell::new(occurrence.at.humanize());
        row.add_cell(if occurrence.at < now {
            relative.fg(Color::DarkGrey)
        } else {
            relative
        });
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_analysis(analysis: &ChangeAnalysis, display_tz: Option<Tz>) {
    let (label, color) = match analysis.change_type {
        ChangeType::NoChange => ("No change", Color::Green),
        ChangeType::FullRebuild => ("Full rebuild", Color::Red),
        ChangeType::PartialUpdate => ("Partial update", Color::Yellow),
    };

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![
        Cell::new("Change"),
        Cell::new(label).fg(color).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![Cell::new("Description"), Cell::new(&analysis.description)]);

    let format = |dt: Option<Occurrence>| {
        dt.map(|dt| format_occurrence(dt, display_tz, false))
            .unwrap_or_else(|| "None".to_string())
    };
    if analysis.change_type == ChangeType::PartialUpdate {
        table.add_row(vec!["Delete after".to_string(), format(analysis.delete_after)]);
        table.add_row(vec!["Generate from".to_string(), format(analysis.generate_from)]);
        table.add_row(vec!["Generate until".to_string(), format(analysis.generate_until)]);
    }

    let list = |dates: &[Occurrence]| {
        if dates.is_empty() {
            "None".to_string()
        } else {
            dates
                .iter()
                .map(|dt| format_occurrence(*dt, display_tz, false))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };
    if !analysis.new_exdates.is_empty() || !analysis.removed_exdates.is_empty() {
        table.add_row(vec!["New EXDATEs".to_string(), list(&analysis.new_exdates)]);
        table.add_row(vec!["Removed EXDATEs".to_string(), list(&analysis.removed_exdates)]);
    }

    println!("{table}");
}
