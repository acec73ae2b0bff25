//! IIDX Result Reader
//!
//! Reads the play date, song title and EX score from a photographed
//! result screen and appends accepted results to a CSV ledger.

mod config;
mod error;
mod ledger;
mod matcher;
mod ocr;
mod paths;
mod submission;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use config::{AppConfig, Backend};
use ledger::{CsvLedger, LedgerRow};
use matcher::{Catalog, TitleMatcher};
use ocr::{
    CloudVisionRecognizer, DateWindow, Extraction, Extractor, TesseractRecognizer, TextRecognizer,
};
use submission::{MissingDatePolicy, format_summary, review};

/// Logs a message to both console and log file with timestamp.
///
/// Console output goes to stderr; stdout is reserved for command results.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    eprint!("{}", line);
    let log_path = paths::get_logs_dir().join("iidx_result_reader.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

#[derive(Parser, Debug)]
#[command(name = "iidx-result-reader")]
#[command(version, about = "Extract date, title and score from a result screen photo", long_about = None)]
struct Cli {
    /// Path to config.json (default: next to the executable, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a result screen and append it to the ledger
    Extract {
        /// Result screen image, or - to read from stdin
        image: PathBuf,

        /// Name recorded as the submitter
        #[arg(short, long, default_value = "anonymous")]
        submitter: String,

        /// Mark the result as a qualifier entry
        #[arg(short, long)]
        qualifier: bool,

        /// Print the result without writing to the ledger
        #[arg(long)]
        dry_run: bool,

        /// Print the extraction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how titles are corrected against the catalog
    Match {
        /// Titles as recognized
        #[arg(required = true)]
        titles: Vec<String>,
    },

    /// Check dates against the configured event window
    CheckDate {
        /// Dates as recognized, e.g. 2025/12/23
        #[arg(required = true)]
        dates: Vec<String>,
    },

    /// Save the three field crops of an image for layout calibration
    Crops {
        /// Result screen image
        image: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "crops")]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join("iidx_result_reader.log");
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    let cli = Cli::parse();

    if let Err(e) = paths::ensure_directories() {
        eprintln!("Warning: could not create log directory: {}", e);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let (config, base_dir) = load_app_config(cli.config.as_deref());
    config.validate().context("Invalid configuration")?;
    let window = config.date_window()?;

    match cli.command {
        Commands::Extract {
            image,
            submitter,
            qualifier,
            dry_run,
            json,
        } => cmd_extract(
            &config,
            &base_dir,
            window.as_ref(),
            &image,
            &submitter,
            qualifier,
            dry_run,
            json,
        ),
        Commands::Match { titles } => cmd_match(&config, &base_dir, &titles),
        Commands::CheckDate { dates } => {
            if cmd_check_date(window.as_ref(), &dates) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(2))
            }
        }
        Commands::Crops { image, out } => cmd_crops(&config, &image, &out),
    }
}

/// Loads the config and returns it with the directory relative paths resolve against.
fn load_app_config(explicit: Option<&Path>) -> (AppConfig, PathBuf) {
    let candidates = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => paths::config_candidates(),
    };

    let mut config = config::load_config(&candidates);
    config.apply_env(|key| std::env::var(key).ok());

    let base_dir = candidates
        .iter()
        .find(|p| p.exists())
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| paths::get_exe_dir().clone());

    (config, base_dir)
}

fn build_matcher(config: &AppConfig, base_dir: &Path) -> Result<TitleMatcher> {
    log("Initializing Title Matcher...");
    let catalog = Catalog::load(&paths::resolve(base_dir, &config.catalog_path))?;
    Ok(TitleMatcher::new(catalog).with_threshold(config.match_threshold))
}

fn build_recognizer(config: &AppConfig) -> Result<Box<dyn TextRecognizer>> {
    let timeout = config.recognition_timeout();
    let recognizer: Box<dyn TextRecognizer> = match config.backend {
        Backend::CloudVision => {
            let api_key = config
                .vision_api_key
                .clone()
                .ok_or_else(|| anyhow!("GOOGLE_VISION_API_KEY is not set"))?;
            Box::new(CloudVisionRecognizer::new(
                config.vision_endpoint.clone(),
                api_key,
                config.language_hints.clone(),
                timeout,
            )?)
        }
        Backend::Tesseract => {
            let exe = ocr::engine::find_tesseract_executable(config.tesseract_path.as_deref())?;
            let recognizer = TesseractRecognizer::new(exe, &config.language_hints, timeout);
            log(&format!("Tesseract languages: {}", recognizer.languages()));
            Box::new(recognizer)
        }
    };
    log(&format!("Recognition backend: {}", recognizer.name()));
    Ok(recognizer)
}

#[allow(clippy::too_many_arguments)]
fn cmd_extract(
    config: &AppConfig,
    base_dir: &Path,
    window: Option<&DateWindow>,
    image: &Path,
    submitter: &str,
    qualifier: bool,
    dry_run: bool,
    json: bool,
) -> Result<ExitCode> {
    let extractor = Extractor::new(
        build_recognizer(config)?,
        config.regions,
        build_matcher(config, base_dir)?,
    );

    let extraction = if image == Path::new("-") {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read image from stdin")?;
        extractor.extract_bytes(&bytes)?
    } else {
        extractor.extract_path(image)?
    };

    for warning in &extraction.warnings {
        log(&format!("Warning: {} unavailable: {}", warning.field, warning.message));
    }

    print!("{}", render_extraction(&extraction, submitter, json)?);

    // In JSON mode stdout carries only the document
    let status = |msg: String| {
        if json {
            log(&msg);
        } else {
            println!("{}", msg);
        }
    };

    let policy = MissingDatePolicy::from_require_date(config.require_date);
    if let Err(rejection) = review(&extraction.record, window, policy) {
        status(format!("Rejected: {}", rejection));
        return Ok(ExitCode::from(2));
    }

    if dry_run {
        status("Dry run: ledger not updated.".to_string());
        return Ok(ExitCode::SUCCESS);
    }

    let ledger = CsvLedger::new(paths::resolve(base_dir, &config.ledger_path));
    let row = LedgerRow::from_record(&extraction.record, submitter, qualifier);
    match ledger.append(&row) {
        Ok(()) => {
            status(format!("Ledger updated: {}", ledger.path().display()));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            log(&format!("Error appending to ledger: {:#}", e));
            status("Failed to update ledger.".to_string());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Extraction as printed on stdout: the reply summary, or a JSON document.
fn render_extraction(extraction: &Extraction, submitter: &str, json: bool) -> Result<String> {
    if json {
        Ok(format!("{}\n", serde_json::to_string_pretty(extraction)?))
    } else {
        Ok(format_summary(&extraction.record, submitter))
    }
}

fn cmd_match(config: &AppConfig, base_dir: &Path, titles: &[String]) -> Result<ExitCode> {
    let matcher = build_matcher(config, base_dir)?;
    if matcher.catalog().is_empty() {
        println!("Catalog is empty; titles pass through unchanged.");
    }

    for title in titles {
        let corrected = matcher.correct(Some(title.clone())).unwrap_or_default();
        match matcher.best_match(title) {
            Some(best) => println!(
                "{:?} -> {:?} (best: #{} {:?}, score {:.1}, threshold {:.1})",
                title,
                corrected,
                best.index + 1,
                best.entry,
                best.score,
                matcher.threshold()
            ),
            None => println!("{:?} -> {:?}", title, corrected),
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Prints each date's verdict. Returns true when every date is readable and in range.
fn cmd_check_date(window: Option<&DateWindow>, dates: &[String]) -> bool {
    match window {
        Some(w) => println!("Range: {} to {}", w.start(), w.end()),
        None => println!("No event window configured; every date is accepted."),
    }

    let mut all_valid = true;
    for raw in dates {
        match ocr::parse_date(raw) {
            Some(date) => {
                let valid = ocr::window::is_within_window(&date, window);
                all_valid &= valid;
                println!("Date: {} -> {} (valid: {})", raw, date, valid);
            }
            None => {
                all_valid = false;
                println!("Date: {} -> unreadable", raw);
            }
        }
    }

    all_valid
}

fn cmd_crops(config: &AppConfig, image: &Path, out: &Path) -> Result<ExitCode> {
    let img = image::open(image).context(format!("Failed to open {}", image.display()))?;
    std::fs::create_dir_all(out).context(format!("Failed to create {}", out.display()))?;

    let crops = ocr::crop_fields(&img, &config.regions);
    for (field, crop) in ocr::FieldKind::ALL.iter().zip(crops.iter()) {
        let path = out.join(format!("{}.png", field));
        crop.save(&path)
            .context(format!("Failed to save {}", path.display()))?;
        log(&format!(
            "Saved {} crop ({}x{}) to {}",
            field,
            crop.width(),
            crop.height(),
            path.display()
        ));
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_extract() {
        let cli = Cli::try_parse_from([
            "iidx-result-reader",
            "extract",
            "shot.jpg",
            "--submitter",
            "TestUser",
            "--qualifier",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Extract {
                image,
                submitter,
                qualifier,
                dry_run,
                json,
            } => {
                assert_eq!(image, PathBuf::from("shot.jpg"));
                assert_eq!(submitter, "TestUser");
                assert!(qualifier);
                assert!(dry_run);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_match_requires_titles() {
        assert!(Cli::try_parse_from(["iidx-result-reader", "match"]).is_err());
    }

    #[test]
    fn test_check_date_verdicts() {
        let window = DateWindow::from_bounds(Some("2025-01-01"), Some("2026-12-31"))
            .unwrap()
            .unwrap();

        assert!(cmd_check_date(
            Some(&window),
            &["2025-12-23".to_string(), "2026/01/01".to_string()]
        ));
        assert!(!cmd_check_date(Some(&window), &["2027-01-01".to_string()]));
        assert!(!cmd_check_date(None, &["N/A".to_string()]));
    }

    #[test]
    fn test_json_output_is_a_single_document() {
        let extraction = Extraction {
            record: ocr::Record {
                date: ocr::parse_date("2025/12/23 21:04"),
                title: Some("Temple of Anubis".to_string()),
                score: Some(1234),
            },
            warnings: vec![ocr::FieldWarning {
                field: ocr::FieldKind::Date,
                message: "recognition timed out after 15000 ms".to_string(),
            }],
        };

        let out = render_extraction(&extraction, "TestUser", true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["record"]["date"], "2025-12-23 21:04");
        assert_eq!(value["record"]["title"], "Temple of Anubis");
        assert_eq!(value["record"]["score"], 1234);
        assert_eq!(value["warnings"][0]["field"], "date");
    }

    #[test]
    fn test_text_output_is_summary() {
        let out = render_extraction(&Extraction::default(), "TestUser", false).unwrap();
        assert!(out.starts_with("### OCR Result\n"));
        assert!(serde_json::from_str::<serde_json::Value>(&out).is_err());
    }

    #[test]
    fn test_cmd_crops_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("screen.png");
        image::DynamicImage::new_rgb8(640, 480).save(&image_path).unwrap();

        let out = dir.path().join("crops");
        cmd_crops(&AppConfig::default(), &image_path, &out).unwrap();

        for name in ["date.png", "score.png", "title.png"] {
            assert!(out.join(name).exists(), "missing {}", name);
        }
    }
}
