//! Fixed proportional screen regions for the result screen.
//!
//! The layout is configuration: each field maps to a rectangle given as
//! fractions of the image size, tuned against one result-screen layout.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The three fields read from a result screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Date,
    Score,
    Title,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [FieldKind::Date, FieldKind::Score, FieldKind::Title];

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Date => "date",
            FieldKind::Score => "score",
            FieldKind::Title => "title",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A rectangle in proportional bounds (0.0 to 1.0) relative to the image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Region {
    pub const fn new(top: f32, bottom: f32, left: f32, right: f32) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// Checks `0 <= top < bottom <= 1` and `0 <= left < right <= 1`.
    pub fn validate(&self, field: FieldKind) -> Result<(), ConfigError> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !(in_unit(self.top) && in_unit(self.bottom) && in_unit(self.left) && in_unit(self.right))
        {
            return Err(ConfigError::InvalidRegion {
                field: field.name(),
                reason: format!("bounds must lie within [0, 1], got {:?}", self),
            });
        }
        if self.top >= self.bottom || self.left >= self.right {
            return Err(ConfigError::InvalidRegion {
                field: field.name(),
                reason: format!("region has no area: {:?}", self),
            });
        }
        Ok(())
    }

    /// Converts to pixel coordinates. Edges are truncated toward zero.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let y0 = ((height as f32 * self.top) as u32).min(height);
        let y1 = ((height as f32 * self.bottom) as u32).min(height);
        let x0 = ((width as f32 * self.left) as u32).min(width);
        let x1 = ((width as f32 * self.right) as u32).min(width);

        PixelRect {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

/// An absolute rectangle in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Region table keyed by field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionLayout {
    pub date: Region,
    pub score: Region,
    pub title: Region,
}

/// Date stamp in the top-left corner. A tight crop works best.
pub const DATE_REGION: Region = Region::new(0.015, 0.045, 0.03, 0.37);
/// EX score digits in the right-hand result panel.
pub const SCORE_REGION: Region = Region::new(0.485, 0.515, 0.65, 0.86);
/// Song title banner spanning most of the width.
pub const TITLE_REGION: Region = Region::new(0.245, 0.268, 0.05, 0.95);

impl Default for RegionLayout {
    fn default() -> Self {
        Self {
            date: DATE_REGION,
            score: SCORE_REGION,
            title: TITLE_REGION,
        }
    }
}

/// Pixel rectangles for every field of one image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldRects {
    pub date: PixelRect,
    pub score: PixelRect,
    pub title: PixelRect,
}

impl FieldRects {
    pub fn get(&self, field: FieldKind) -> PixelRect {
        match field {
            FieldKind::Date => self.date,
            FieldKind::Score => self.score,
            FieldKind::Title => self.title,
        }
    }
}

impl RegionLayout {
    pub fn get(&self, field: FieldKind) -> Region {
        match field {
            FieldKind::Date => self.date,
            FieldKind::Score => self.score,
            FieldKind::Title => self.title,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for field in FieldKind::ALL {
            self.get(field).validate(field)?;
        }
        Ok(())
    }

    /// Computes the pixel rectangles for an image of the given size.
    ///
    /// Zero width or height yields empty rectangles; callers reject such
    /// images before getting here.
    pub fn regions(&self, width: u32, height: u32) -> FieldRects {
        FieldRects {
            date: self.date.to_pixels(width, height),
            score: self.score.to_pixels(width, height),
            title: self.title.to_pixels(width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        assert!(RegionLayout::default().validate().is_ok());
    }

    #[test]
    fn test_regions_for_1920x1080() {
        let rects = RegionLayout::default().regions(1920, 1080);

        // int(1080 * 0.015) = 16, int(1080 * 0.045) = 48
        assert_eq!(rects.date.y, 16);
        assert_eq!(rects.date.height, 32);
        assert_eq!(rects.date.x, 57);
        assert_eq!(rects.date.width, 710 - 57);

        assert_eq!(rects.score.x, 1248);
        assert_eq!(rects.score.y, 523);
        assert_eq!(rects.title.x, 96);
        assert_eq!(rects.title.width, 1824 - 96);
    }

    #[test]
    fn test_regions_zero_size_is_empty() {
        let rects = RegionLayout::default().regions(0, 1080);
        for field in FieldKind::ALL {
            assert!(rects.get(field).is_empty());
        }
    }

    #[test]
    fn test_region_validate_rejects_inverted_bounds() {
        let region = Region::new(0.5, 0.4, 0.1, 0.2);
        assert!(region.validate(FieldKind::Score).is_err());
    }

    #[test]
    fn test_region_validate_rejects_out_of_range() {
        let region = Region::new(0.1, 1.2, 0.1, 0.2);
        assert!(region.validate(FieldKind::Title).is_err());
    }

    #[test]
    fn test_layout_deserializes_partial_override() {
        let json = r#"{ "score": { "top": 0.4, "bottom": 0.45, "left": 0.6, "right": 0.9 } }"#;
        let layout: RegionLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.score, Region::new(0.4, 0.45, 0.6, 0.9));
        assert_eq!(layout.date, DATE_REGION);
    }
}
