//! # Cadence Core Library
//!
//! An RFC 5545 recurrence engine: rule expansion, recurrence sets with
//! explicit inclusions and exclusions, an editing façade, and a change
//! analyzer that tells a materialized schedule how to react to an edit.
//!
//! ## Features
//!
//! - **Full RRULE Expansion**: Every frequency from YEARLY to SECONDLY with
//!   BYMONTH, BYWEEKNO, BYYEARDAY, BYMONTHDAY, BYDAY (with ordinals),
//!   BYHOUR/BYMINUTE/BYSECOND, BYSETPOS and BYEASTER
//! - **Timezone Awareness**: IANA zones via `chrono-tz`, wall-clock
//!   preserving expansion across DST transitions
//! - **All-Day Sets**: Date-only recurrence normalized to UTC midnights
//! - **Lazy Iteration**: Occurrences are produced on demand, in order
//! - **Change Analysis**: Minimal regeneration windows for edited rules
//!
//! ## Core Modules
//!
//! - [`rule`]: Rule compilation and expansion
//! - [`collection`]: Recurrence sets merging RRULE, RDATE and EXDATE
//! - [`helper`]: Editable recurrence sets with DTSTART alignment checks
//! - [`analyzer`]: Old-vs-new recurrence change classification
//! - [`parser`] / [`serializer`]: RFC 5545 line reading and writing
//! - [`calendar`]: Calendar arithmetic shared by the engine
//! - [`timezone`]: Zone resolution and DST-aware localization
//! - [`models`]: Core data structures
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust
//! use cadence_core::{analyzer::ChangeAnalyzer, helper::RecurrenceSetHelper};
//! use chrono_tz::Tz;
//!
//! # fn main() -> Result<(), cadence_core::error::CoreError> {
//! let mut set = RecurrenceSetHelper::from_lines(
//!     &["DTSTART:20240101T090000Z", "RRULE:FREQ=WEEKLY;BYDAY=MO,WE;COUNT=6"],
//!     Tz::UTC,
//! )?;
//! set.validate_dtstart_alignment(false)?;
//!
//! let first_three = set.collection().all(Some(3));
//! assert_eq!(first_three.len(), 3);
//!
//! set.add_exdate(first_three[1])?;
//!
//! let analysis = ChangeAnalyzer::default().analyze(
//!     &["DTSTART:20240101T090000Z", "RRULE:FREQ=WEEKLY;BYDAY=MO,WE;COUNT=6"],
//!     &set.to_lines(),
//! )?;
//! assert_eq!(analysis.new_exdates, vec![first_three[1]]);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod calendar;
pub mod collection;
pub mod error;
pub mod helper;
pub mod models;
pub mod parser;
pub mod rule;
pub mod serializer;
pub mod timezone;

pub use analyzer::ChangeAnalyzer;
pub use collection::RecurrenceCollection;
pub use error::{AlignmentDiagnostic, AlignmentError, CoreError};
pub use helper::RecurrenceSetHelper;
pub use models::{ChangeAnalysis, ChangeType, Frequency, Occurrence, RuleOptions, WeekdayRef};
pub use rule::Rule;
