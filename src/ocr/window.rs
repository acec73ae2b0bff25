use chrono::NaiveDate;

use super::extract::NormalizedDate;
use crate::error::ConfigError;

/// Inclusive event window. Validated once when the configuration loads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvertedWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Builds a window from optional `YYYY-MM-DD` bounds.
    ///
    /// Returns `Ok(None)` when either bound is missing, which disables
    /// window validation entirely.
    pub fn from_bounds(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>, ConfigError> {
        let (Some(start), Some(end)) = (start, end) else {
            return Ok(None);
        };
        let start = parse_bound("event_start_date", start)?;
        let end = parse_bound("event_end_date", end)?;
        Self::new(start, end).map(Some)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: &NormalizedDate) -> bool {
        self.start <= date.date() && date.date() <= self.end
    }
}

fn parse_bound(field: &'static str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Window check with the permissive default: no window means every date passes.
pub fn is_within_window(date: &NormalizedDate, window: Option<&DateWindow>) -> bool {
    window.is_none_or(|w| w.contains(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::extract::parse_date;

    fn window() -> DateWindow {
        DateWindow::from_bounds(Some("2025-01-01"), Some("2026-12-31"))
            .unwrap()
            .unwrap()
    }

    fn date(s: &str) -> NormalizedDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_window_membership() {
        let w = window();
        assert!(w.contains(&date("2025-12-23")));
        assert!(!w.contains(&date("2024-12-31")));
        assert!(!w.contains(&date("2027-01-01")));
        assert!(w.contains(&date("2026/01/01")));
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let w = window();
        assert!(w.contains(&date("2025-01-01")));
        assert!(w.contains(&date("2026-12-31 23:59")));
    }

    #[test]
    fn test_missing_bound_disables_window() {
        assert_eq!(DateWindow::from_bounds(None, Some("2026-12-31")).unwrap(), None);
        assert_eq!(DateWindow::from_bounds(Some("2025-01-01"), None).unwrap(), None);
        assert!(is_within_window(&date("2001-01-01"), None));
        assert!(!is_within_window(&date("2001-01-01"), Some(&window())));
    }

    #[test]
    fn test_malformed_bound_is_config_error() {
        let err = DateWindow::from_bounds(Some("2025/01/01"), Some("2026-12-31")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDate { field: "event_start_date", .. }));

        let err = DateWindow::from_bounds(Some("2025-01-01"), Some("soon")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDate { field: "event_end_date", .. }));
    }

    #[test]
    fn test_inverted_window_is_config_error() {
        let err = DateWindow::from_bounds(Some("2026-12-31"), Some("2025-01-01")).unwrap_err();
        assert!(matches!(err, ConfigError::InvertedWindow { .. }));
    }

    #[test]
    fn test_single_day_window() {
        let w = DateWindow::from_bounds(Some("2026-02-11"), Some("2026-02-11"))
            .unwrap()
            .unwrap();
        assert!(w.contains(&date("2026-02-11 10:00")));
        assert!(!w.contains(&date("2026-02-12")));
    }
}
