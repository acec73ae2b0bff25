//! Application configuration.
//!
//! Loads settings from config.json at startup, then applies environment
//! overrides for the event window and the recognition credential.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::matcher::DEFAULT_MATCH_THRESHOLD;
use crate::ocr::engine::DEFAULT_VISION_ENDPOINT;
use crate::ocr::{DateWindow, RegionLayout};

/// Which recognition backend to build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    CloudVision,
    Tesseract,
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Recognition backend used for every region
    pub backend: Backend,
    /// Language hints passed to the backend (the screen mixes Japanese and English)
    pub language_hints: Vec<String>,
    /// Per-call recognition timeout (milliseconds)
    pub recognition_timeout_ms: u64,
    /// Cloud Vision annotate endpoint
    pub vision_endpoint: String,
    /// Cloud Vision API key. Usually supplied through GOOGLE_VISION_API_KEY.
    #[serde(skip_serializing)]
    pub vision_api_key: Option<String>,
    /// Explicit tesseract executable; searched on PATH when unset
    pub tesseract_path: Option<PathBuf>,
    /// Newline-delimited list of known song titles
    pub catalog_path: PathBuf,
    /// Minimum similarity (0-100) for replacing a recognized title
    pub match_threshold: f64,
    /// CSV ledger that accepted results are appended to
    pub ledger_path: PathBuf,
    /// First day of the event window (YYYY-MM-DD)
    pub event_start_date: Option<String>,
    /// Last day of the event window (YYYY-MM-DD)
    pub event_end_date: Option<String>,
    /// Reject results whose date could not be read
    pub require_date: bool,
    /// Proportional screen regions per field
    pub regions: RegionLayout,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            language_hints: vec!["ja".to_string(), "en".to_string()],
            recognition_timeout_ms: 15000,
            vision_endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            vision_api_key: None,
            tesseract_path: None,
            catalog_path: PathBuf::from("songs.txt"),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            ledger_path: PathBuf::from("results.csv"),
            event_start_date: None,
            event_end_date: None,
            require_date: true,
            regions: RegionLayout::default(),
        }
    }
}

impl AppConfig {
    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_millis(self.recognition_timeout_ms)
    }

    /// Validated event window, or `None` when either bound is unset.
    pub fn date_window(&self) -> Result<Option<DateWindow>, ConfigError> {
        DateWindow::from_bounds(
            self.event_start_date.as_deref(),
            self.event_end_date.as_deref(),
        )
    }

    /// Fails fast on a malformed window or region table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.regions.validate()?;
        self.date_window()?;
        Ok(())
    }

    /// Applies environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(start) = non_empty("EVENT_START_DATE") {
            self.event_start_date = Some(start);
        }
        if let Some(end) = non_empty("EVENT_END_DATE") {
            self.event_end_date = Some(end);
        }
        if let Some(key) = non_empty("GOOGLE_VISION_API_KEY") {
            self.vision_api_key = Some(key);
        }
    }
}

/// Reads config from the first existing candidate, falling back to defaults.
pub fn load_config(candidates: &[PathBuf]) -> AppConfig {
    for config_path in candidates {
        crate::log(&format!("Looking for config at: {}", config_path.display()));
        if config_path.exists() {
            return load_config_file(config_path);
        }
    }

    crate::log("config.json not found. Using default config.");
    AppConfig::default()
}

fn load_config_file(config_path: &Path) -> AppConfig {
    match fs::read_to_string(config_path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                crate::log(&format!("Config loaded from {}", config_path.display()));
                return config;
            }
            Err(e) => {
                crate::log(&format!(
                    "Warning: failed to parse {}: {}. Using defaults.",
                    config_path.display(),
                    e
                ));
            }
        },
        Err(e) => {
            crate::log(&format!(
                "Warning: failed to read {}: {}. Using defaults.",
                config_path.display(),
                e
            ));
        }
    }

    AppConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.backend, Backend::CloudVision);
        assert_eq!(config.language_hints, vec!["ja", "en"]);
        assert_eq!(config.match_threshold, 45.0);
        assert!(config.require_date);
        assert!(config.validate().is_ok());
        assert_eq!(config.date_window().unwrap(), None);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "backend": "tesseract", "event_start_date": "2025-01-01", "event_end_date": "2026-12-31" }"#,
        )
        .unwrap();

        let config = load_config(&[path]);
        assert_eq!(config.backend, Backend::Tesseract);
        assert_eq!(config.recognition_timeout_ms, 15000);
        assert!(config.date_window().unwrap().is_some());
    }

    #[test]
    fn test_load_first_existing_candidate() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let present = dir.path().join("config.json");
        fs::write(&present, r#"{ "match_threshold": 60.0 }"#).unwrap();

        let config = load_config(&[missing, present]);
        assert_eq!(config.match_threshold, 60.0);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_config(&[path]);
        assert_eq!(config.match_threshold, 45.0);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("EVENT_START_DATE", "2025-01-01"),
            ("EVENT_END_DATE", "2026-12-31"),
            ("GOOGLE_VISION_API_KEY", "secret"),
        ]));

        assert_eq!(config.event_start_date.as_deref(), Some("2025-01-01"));
        assert_eq!(config.vision_api_key.as_deref(), Some("secret"));
        assert!(config.date_window().unwrap().is_some());
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let mut config = AppConfig {
            event_start_date: Some("2025-01-01".to_string()),
            ..AppConfig::default()
        };
        config.apply_env(env(&[("EVENT_START_DATE", " ")]));
        assert_eq!(config.event_start_date.as_deref(), Some("2025-01-01"));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let config = AppConfig {
            event_start_date: Some("2026-12-31".to_string()),
            event_end_date: Some("2025-01-01".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedWindow { .. })
        ));
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let config = AppConfig {
            vision_api_key: Some("secret".to_string()),
            ..AppConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
