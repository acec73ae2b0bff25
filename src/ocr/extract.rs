use std::fmt;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use crate::log;

/// Year beginning with 20, separator, month, separator, day, optional time.
const DATE_PATTERN: &str = r"20[0-9]{2}[-./][0-9]{2}[-./][0-9]{2}( [0-9]{2}:[0-9]{2})?";

/// Digit runs. Full-width digits are folded to ASCII before matching.
const DIGIT_RUN_PATTERN: &str = r"[0-9]+";

/// Scores on this screen never reach this value.
const SCORE_CEILING: u32 = 6000;

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DATE_PATTERN).expect("date pattern is valid"))
}

fn digit_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DIGIT_RUN_PATTERN).expect("digit pattern is valid"))
}

/// Folds full-width digits, date separators, colon and the ideographic
/// space to ASCII. Japanese recognition often returns `２０２５／１２／２３`.
fn fold_fullwidth(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{FF0D}'..='\u{FF1A}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect()
}

/// A play date in canonical `YYYY-MM-DD[ HH:MM]` form.
///
/// Only built by `parse_date`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedDate {
    date: NaiveDate,
    time: Option<NaiveTime>,
}

impl NormalizedDate {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }
}

impl fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        if let Some(time) = self.time {
            write!(f, " {}", time.format("%H:%M"))?;
        }
        Ok(())
    }
}

impl serde::Serialize for NormalizedDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Finds and normalizes the first date in the recognized text.
///
/// Separators `/` and `.` become `-`, and the first 10 characters are
/// parsed as a calendar date. Anything that fails yields `None` with a
/// warning; a bad date never aborts the other fields.
pub fn parse_date(raw: &str) -> Option<NormalizedDate> {
    let flattened = fold_fullwidth(raw).replace(['\r', '\n'], " ");
    let Some(found) = date_regex().find(&flattened) else {
        if !raw.trim().is_empty() {
            log(&format!("Warning: no date found in {:?}", raw));
        }
        return None;
    };

    let normalized = found.as_str().replace(['/', '.'], "-");
    // The pattern only matches ASCII, so byte slicing is safe here
    let date = match NaiveDate::parse_from_str(&normalized[..10], "%Y-%m-%d") {
        Ok(date) => date,
        Err(e) => {
            log(&format!(
                "Warning: date parsing failed for {:?}: {}",
                found.as_str(),
                e
            ));
            return None;
        }
    };

    let time = normalized.get(11..).and_then(|t| {
        NaiveTime::parse_from_str(t, "%H:%M")
            .map_err(|e| log(&format!("Warning: dropping invalid time {:?}: {}", t, e)))
            .ok()
    });

    Some(NormalizedDate { date, time })
}

/// Picks the score out of the recognized text.
///
/// Every digit run of length 3 or 4 with a value below the ceiling is a
/// candidate; the largest candidate wins. The score is rendered larger
/// than the surrounding digits, so magnitude is the tie-breaker. This is
/// a heuristic and can misfire when several same-length numbers share
/// the crop.
pub fn parse_score(raw: &str) -> Option<u32> {
    let folded = fold_fullwidth(raw);
    let candidates: Vec<u32> = digit_run_regex()
        .find_iter(&folded)
        .map(|m| m.as_str())
        .filter(|digits| (3..=4).contains(&digits.len()))
        .filter_map(|digits| digits.parse::<u32>().ok())
        .filter(|&value| value < SCORE_CEILING)
        .collect();

    let score = candidates.iter().copied().max();
    if score.is_none() && !raw.trim().is_empty() {
        log(&format!("Warning: no score candidate in {:?}", raw));
    }
    score
}

/// Flattens line breaks and trims. Correction happens in the matcher.
pub fn clean_title(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let cleaned = raw.replace("\r\n", " ").replace(['\r', '\n'], " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    Some(cleaned.to_string())
}
