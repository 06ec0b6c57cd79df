use std::fmt;

use thiserror::Error;

use crate::models::Occurrence;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid rule: {0}")]
    Validation(String),

    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),
}

impl CoreError {
    pub(crate) fn no_rule() -> Self {
        CoreError::State("no rule present".to_string())
    }
}

/// What was found instead of DTSTART when checking alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentDiagnostic {
    /// The first occurrence on or after DTSTART.
    FirstOccurrence(Occurrence),
    /// Nothing on or after DTSTART, but an earlier occurrence exists.
    PrecedingOccurrence(Occurrence),
    /// The recurrence set produces nothing at all.
    NoOccurrences,
}

impl fmt::Display for AlignmentDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentDiagnostic::FirstOccurrence(dt) => {
                write!(f, "first occurrence is {}", dt)
            }
            AlignmentDiagnostic::PrecedingOccurrence(dt) => {
                write!(f, "no occurrence on or after it, nearest preceding occurrence is {}", dt)
            }
            AlignmentDiagnostic::NoOccurrences => write!(f, "the rule produces no occurrences"),
        }
    }
}

/// DTSTART is not a genuine occurrence of its own recurrence set (RFC 5545 §3.8.5.3).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("DTSTART {dtstart} does not match the recurrence rule: {diagnostic}")]
pub struct AlignmentError {
    pub dtstart: Occurrence,
    pub diagnostic: AlignmentDiagnostic,
}

impl AlignmentError {
    /// The first occurrence on or after DTSTART, if that is what was found.
    pub fn actual_first(&self) -> Option<Occurrence> {
        match self.diagnostic {
            AlignmentDiagnostic::FirstOccurrence(dt) => Some(dt),
            _ => None,
        }
    }

    /// The nearest occurrence before DTSTART, if that is what was found.
    pub fn preceding(&self) -> Option<Occurrence> {
        match self.diagnostic {
            AlignmentDiagnostic::PrecedingOccurrence(dt) => Some(dt),
            _ => None,
        }
    }
}
