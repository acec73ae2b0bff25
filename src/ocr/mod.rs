pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod region;
pub mod window;

pub use engine::{CloudVisionRecognizer, TesseractRecognizer, TextRecognizer};
pub use extract::{NormalizedDate, clean_title, parse_date, parse_score};
pub use region::{FieldKind, RegionLayout};
pub use window::DateWindow;

use std::path::Path;

use image::{DynamicImage, GrayImage};
use serde::Serialize;

use crate::error::{ExtractError, RecognitionError};
use crate::log;
use crate::matcher::TitleMatcher;
use preprocess::crop_gray;

/// Structured result of one extraction. Every field is independent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    pub date: Option<NormalizedDate>,
    pub title: Option<String>,
    pub score: Option<u32>,
}

/// A recoverable per-field failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldWarning {
    pub field: FieldKind,
    pub message: String,
}

/// Record plus the warnings raised while building it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub record: Record,
    pub warnings: Vec<FieldWarning>,
}

/// Raw text per field, in `FieldKind::ALL` order.
type RawTexts = [Result<String, RecognitionError>; 3];

/// Screenshot → record pipeline.
///
/// Crops the three field regions, recognizes them concurrently, parses
/// each field independently and corrects the title against the catalog.
pub struct Extractor {
    recognizer: Box<dyn TextRecognizer>,
    layout: RegionLayout,
    matcher: TitleMatcher,
}

impl Extractor {
    pub fn new(
        recognizer: Box<dyn TextRecognizer>,
        layout: RegionLayout,
        matcher: TitleMatcher,
    ) -> Self {
        Self {
            recognizer,
            layout,
            matcher,
        }
    }

    pub fn extract_path(&self, path: &Path) -> Result<Extraction, ExtractError> {
        let img = image::open(path)
            .map_err(|e| ExtractError::invalid_image(format!("{}: {}", path.display(), e)))?;
        self.extract_image(&img)
    }

    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| ExtractError::invalid_image(e.to_string()))?;
        self.extract_image(&img)
    }

    pub fn extract_image(&self, img: &DynamicImage) -> Result<Extraction, ExtractError> {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(ExtractError::invalid_image(format!(
                "image has no area ({}x{})",
                width, height
            )));
        }

        // A region that truncates to nothing is an input problem, not a
        // recognition failure
        let rects = self.layout.regions(width, height);
        if let Some(field) = FieldKind::ALL.into_iter().find(|&f| rects.get(f).is_empty()) {
            return Err(ExtractError::invalid_image(format!(
                "{} region is empty on a {}x{} image",
                field, width, height
            )));
        }

        let crops = FieldKind::ALL.map(|field| crop_gray(img, rects.get(field)));
        let raw = self.recognize_all(&crops);
        drop(crops);

        self.assemble(raw)
    }

    /// Runs one recognition call per field on scoped threads.
    fn recognize_all(&self, crops: &[GrayImage; 3]) -> RawTexts {
        let recognizer = self.recognizer.as_ref();
        std::thread::scope(|scope| {
            let handles = crops
                .each_ref()
                .map(|crop| scope.spawn(move || recognizer.recognize(crop)));
            handles.map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(RecognitionError::backend("recognition thread panicked")))
            })
        })
    }

    fn assemble(&self, raw: RawTexts) -> Result<Extraction, ExtractError> {
        let mut warnings = Vec::new();
        let mut texts: [Option<String>; 3] = [None, None, None];

        for ((field, result), slot) in FieldKind::ALL.into_iter().zip(raw).zip(texts.iter_mut()) {
            match result {
                Ok(text) => {
                    log(&format!("{} raw: {:?}", field, text));
                    *slot = Some(text);
                }
                Err(e) => {
                    log(&format!("Warning: {} recognition failed: {}", field, e));
                    warnings.push(FieldWarning {
                        field,
                        message: e.to_string(),
                    });
                }
            }
        }

        if warnings.len() == FieldKind::ALL.len() {
            return Err(ExtractError::BackendUnavailable {
                failures: warnings
                    .into_iter()
                    .map(|w| format!("{}: {}", w.field, w.message))
                    .collect(),
            });
        }

        let [date_text, score_text, title_text] = texts;
        let record = Record {
            date: date_text.as_deref().and_then(parse_date),
            score: score_text.as_deref().and_then(parse_score),
            title: self
                .matcher
                .correct(title_text.as_deref().and_then(clean_title)),
        };

        log(&format!(
            "Extracted ({}): date={:?} title={:?} score={:?}",
            self.recognizer.name(),
            record.date.map(|d| d.to_string()),
            record.title,
            record.score
        ));

        Ok(Extraction { record, warnings })
    }
}

/// Grayscale crops for every field, in `FieldKind::ALL` order.
pub fn crop_fields(img: &DynamicImage, layout: &RegionLayout) -> [GrayImage; 3] {
    let rects = layout.regions(img.width(), img.height());
    FieldKind::ALL.map(|field| crop_gray(img, rects.get(field)))
}
