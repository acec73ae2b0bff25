use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat};

use super::region::PixelRect;
use crate::error::RecognitionError;

/// Crops a pixel rectangle out of the image and converts it to grayscale.
///
/// The rectangle is clamped to the image bounds. Grayscale is all the
/// preprocessing the recognition backends need for this screen.
pub fn crop_gray(img: &DynamicImage, rect: PixelRect) -> GrayImage {
    let (w, h) = (img.width(), img.height());

    let x0 = rect.x.min(w);
    let y0 = rect.y.min(h);
    let rw = rect.width.min(w - x0);
    let rh = rect.height.min(h - y0);

    img.crop_imm(x0, y0, rw, rh).to_luma8()
}

/// Encodes a region as PNG for transmission to a recognition backend.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, RecognitionError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| RecognitionError::Encode {
            message: e.to_string(),
        })?;
    Ok(buf.into_inner())
}
