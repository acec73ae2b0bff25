//! Song title correction against a known catalog.
//!
//! Recognized titles are often heavily corrupted (mixed scripts, dropped
//! characters), so the acceptance threshold is tuned low.

pub mod fuzz;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::log;

/// Scores at or above this value replace the recognized title.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 45.0;

/// Ordered list of known song titles. Read-only after loading.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    titles: Vec<String>,
}

impl Catalog {
    pub fn new(titles: Vec<String>) -> Self {
        Self { titles }
    }

    /// Loads a newline-delimited title list. Blank lines are skipped.
    ///
    /// A missing file is not an error: matching becomes a pass-through.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log(&format!(
                "Warning: {} not found. Fuzzy matching disabled.",
                path.display()
            ));
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .context(format!("Failed to read catalog: {}", path.display()))?;
        let catalog = Self::parse(&content);
        log(&format!(
            "Loaded {} titles from {}",
            catalog.len(),
            path.display()
        ));
        Ok(catalog)
    }

    pub fn parse(content: &str) -> Self {
        let titles = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(titles)
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// Best catalog entry for a title.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate<'a> {
    pub entry: &'a str,
    pub score: f64,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct TitleMatcher {
    catalog: Catalog,
    threshold: f64,
}

impl TitleMatcher {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Highest-scoring catalog entry. Ties go to the earliest entry.
    pub fn best_match(&self, title: &str) -> Option<MatchCandidate<'_>> {
        let mut best: Option<MatchCandidate<'_>> = None;
        for (index, entry) in self.catalog.titles().iter().enumerate() {
            let score = fuzz::weighted_ratio(title, entry);
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(MatchCandidate {
                    entry,
                    score,
                    index,
                });
            }
        }
        best
    }

    /// Replaces the title with its closest catalog entry when the match is
    /// good enough; otherwise returns it unchanged.
    pub fn correct(&self, title: Option<String>) -> Option<String> {
        let title = title?;
        if self.catalog.is_empty() {
            return Some(title);
        }

        match self.best_match(&title) {
            Some(candidate) => {
                log(&format!(
                    "Matching {:?} -> {:?} (score: {:.1})",
                    title, candidate.entry, candidate.score
                ));
                if candidate.score >= self.threshold {
                    Some(candidate.entry.to_string())
                } else {
                    Some(title)
                }
            }
            None => Some(title),
        }
    }
}
