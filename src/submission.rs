//! Caller-side review of an extracted record.
//!
//! The extraction core never rejects a record. Whether a missing date or a
//! date outside the event window blocks submission is decided here.

use std::fmt;

use chrono::NaiveDate;

use crate::ocr::{DateWindow, NormalizedDate, Record};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingDatePolicy {
    Reject,
    Accept,
}

impl MissingDatePolicy {
    pub fn from_require_date(require_date: bool) -> Self {
        if require_date {
            Self::Reject
        } else {
            Self::Accept
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    MissingDate,
    OutsideWindow {
        date: NormalizedDate,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingDate => write!(
                f,
                "Could not read the play date from the image. Please upload a clearer screenshot."
            ),
            Rejection::OutsideWindow { date, start, end } => write!(
                f,
                "Result dated {} is outside the event window ({} to {}).",
                date, start, end
            ),
        }
    }
}

impl std::error::Error for Rejection {}

/// Applies the date policy and the event window to a record.
pub fn review(
    record: &Record,
    window: Option<&DateWindow>,
    policy: MissingDatePolicy,
) -> Result<(), Rejection> {
    let Some(date) = record.date else {
        return match policy {
            MissingDatePolicy::Reject => Err(Rejection::MissingDate),
            MissingDatePolicy::Accept => Ok(()),
        };
    };

    match window {
        Some(w) if !w.contains(&date) => Err(Rejection::OutsideWindow {
            date,
            start: w.start(),
            end: w.end(),
        }),
        _ => Ok(()),
    }
}

/// Human-readable summary of a record, `N/A` for absent fields.
pub fn format_summary(record: &Record, submitter: &str) -> String {
    let na = || "N/A".to_string();
    format!(
        "### OCR Result\n**Date**: {}\n**Player**: {}\n**Song**: {}\n**Score**: {}\n",
        record.date.map(|d| d.to_string()).unwrap_or_else(na),
        submitter,
        record.title.clone().unwrap_or_else(na),
        record.score.map(|s| s.to_string()).unwrap_or_else(na),
    )
}
