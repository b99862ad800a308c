//! Raster codec backed by the `image` crate.

use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};

use amora_application::ImageCodec;
use amora_core::{AppError, AppResult};
use amora_domain::{CropParams, JPEG_QUALITY, Rotation};

/// In-process implementation of the raster processing port.
#[derive(Debug, Default, Clone)]
pub struct RasterImageCodec;

impl RasterImageCodec {
    /// Creates the codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageCodec for RasterImageCodec {
    async fn probe_dimensions(&self, bytes: &[u8]) -> AppResult<(u32, u32)> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|error| {
                AppError::Validation(format!("unrecognized image format: {error}"))
            })?
            .into_dimensions()
            .map_err(|error| {
                AppError::Validation(format!("could not read image dimensions: {error}"))
            })
    }

    async fn render_crop(&self, bytes: &[u8], crop: &CropParams) -> AppResult<Vec<u8>> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|error| AppError::Validation(format!("could not decode image: {error}")))?;

        let rotated = match crop.rotation {
            Rotation::None => decoded,
            Rotation::Quarter => decoded.rotate90(),
            Rotation::Half => decoded.rotate180(),
            Rotation::ThreeQuarter => decoded.rotate270(),
        };

        // Clamp the selection to the rotated frame so an off-by-one from the
        // crop view never panics the encoder.
        let x = crop.x.min(rotated.width().saturating_sub(1));
        let y = crop.y.min(rotated.height().saturating_sub(1));
        let width = crop.width.min(rotated.width() - x);
        let height = crop.height.min(rotated.height() - y);
        if width == 0 || height == 0 {
            return Err(AppError::Validation(
                "crop rectangle lies outside the image".to_owned(),
            ));
        }

        let cropped = rotated.crop_imm(x, y, width, height);

        let mut encoded = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
        // JPEG has no alpha channel; flatten to RGB before encoding.
        DynamicImage::ImageRgb8(cropped.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(|error| AppError::Internal(format!("could not encode jpeg: {error}")))?;

        Ok(encoded.into_inner())
    }
}
