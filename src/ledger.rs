//! CSV ledger for accepted results.
//!
//! Append-only: the file is opened per row, so rows written before a crash
//! are kept. Each row contains: date, submitter, title, score, qualifier.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::ocr::Record;

/// CSV header row.
const CSV_HEADER: &str = "date,submitter,title,score,qualifier";

/// Title written when none was recognized.
const UNKNOWN_TITLE: &str = "Unknown";

/// One ledger row, with absent fields already filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub date: String,
    pub submitter: String,
    pub title: String,
    pub score: u32,
    pub qualifier: bool,
}

impl LedgerRow {
    /// Missing date falls back to the current time, missing title to
    /// "Unknown" and missing score to 0.
    pub fn from_record(record: &Record, submitter: &str, qualifier: bool) -> Self {
        let date = record
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d %H:%M").to_string());

        Self {
            date,
            submitter: submitter.to_string(),
            title: record
                .title
                .clone()
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            score: record.score.unwrap_or(0),
            qualifier,
        }
    }

    fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{}",
            escape_field(&self.date),
            escape_field(&self.submitter),
            escape_field(&self.title),
            self.score,
            self.qualifier,
        )
    }
}

/// Quotes a field containing a delimiter, quote, or line break.
fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the header if the file doesn't exist or is empty.
    ///
    /// If the file exists and has content, this does nothing (preserves existing data).
    pub fn init(&self) -> Result<()> {
        if self.path.exists() {
            let file = File::open(&self.path).context("Failed to open existing ledger")?;
            let reader = BufReader::new(file);
            if reader.lines().next().is_some() {
                return Ok(());
            }
        }

        let mut file = File::create(&self.path).context("Failed to create ledger file")?;
        writeln!(file, "{}", CSV_HEADER).context("Failed to write ledger header")?;
        Ok(())
    }

    /// Appends one row. Failures are reported, never retried.
    pub fn append(&self, row: &LedgerRow) -> Result<()> {
        self.init()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("Failed to open ledger for append")?;

        writeln!(file, "{}", row.to_csv_line()).context("Failed to write ledger row")?;
        Ok(())
    }
}
