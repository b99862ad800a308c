//! Client-side crop parameters.
//!
//! Cropping operates purely on these values until the user confirms, at
//! which point the codec renders the selected region into a fresh JPEG.

use amora_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Minimum zoom factor for the crop view.
pub const MIN_ZOOM: f32 = 1.0;

/// Maximum zoom factor for the crop view.
pub const MAX_ZOOM: f32 = 3.0;

/// JPEG quality used when re-encoding a confirmed crop (0-100).
pub const JPEG_QUALITY: u8 = 90;

/// Rotation applied before cropping, in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// No rotation.
    #[default]
    None,
    /// 90 degrees clockwise.
    Quarter,
    /// 180 degrees.
    Half,
    /// 270 degrees clockwise.
    ThreeQuarter,
}

impl Rotation {
    /// Returns the rotation in degrees.
    #[must_use]
    pub fn degrees(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }

    /// Advances the rotation by one quarter turn clockwise.
    #[must_use]
    pub fn next_quarter(&self) -> Self {
        match self {
            Self::None => Self::Quarter,
            Self::Quarter => Self::Half,
            Self::Half => Self::ThreeQuarter,
            Self::ThreeQuarter => Self::None,
        }
    }
}

/// Target aspect ratio of the cropped photo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Width component of the ratio.
    pub width: u16,
    /// Height component of the ratio.
    pub height: u16,
}

impl AspectRatio {
    /// Square crop used for profile photos.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Portrait crop used for gallery photos.
    pub const PORTRAIT: Self = Self {
        width: 3,
        height: 4,
    };

    /// Ratio as a fraction.
    #[must_use]
    pub fn as_fraction(&self) -> f32 {
        f32::from(self.width) / f32::from(self.height)
    }
}

/// Confirmed crop selection over the (already rotated) source image, in
/// source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropParams {
    /// Left edge of the crop rectangle.
    pub x: u32,
    /// Top edge of the crop rectangle.
    pub y: u32,
    /// Width of the crop rectangle.
    pub width: u32,
    /// Height of the crop rectangle.
    pub height: u32,
    /// Zoom factor the selection was made at, clamped to 1.0-3.0.
    pub zoom: f32,
    /// Target aspect ratio.
    pub aspect: AspectRatio,
    /// Rotation applied before the crop rectangle is interpreted.
    pub rotation: Rotation,
}

impl CropParams {
    /// Creates validated crop parameters.
    pub fn new(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        zoom: f32,
        aspect: AspectRatio,
        rotation: Rotation,
    ) -> AppResult<Self> {
        if width == 0 || height == 0 {
            return Err(AppError::Validation(
                "crop rectangle must have a non-zero size".to_owned(),
            ));
        }

        if !zoom.is_finite() {
            return Err(AppError::Validation("zoom must be finite".to_owned()));
        }

        Ok(Self {
            x,
            y,
            width,
            height,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            aspect,
            rotation,
        })
    }

    /// Full-frame square crop over an image of the given dimensions, centered
    /// on the larger axis. Used when the user confirms without adjusting.
    #[must_use]
    pub fn centered_square(width: u32, height: u32) -> Self {
        let side = width.min(height);
        Self {
            x: (width - side) / 2,
            y: (height - side) / 2,
            width: side,
            height: side,
            zoom: MIN_ZOOM,
            aspect: AspectRatio::SQUARE,
            rotation: Rotation::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use amora_core::AppResult;

    use super::{AspectRatio, CropParams, MAX_ZOOM, Rotation};

    #[test]
    fn zoom_is_clamped_to_the_supported_range() -> AppResult<()> {
        let params = CropParams::new(0, 0, 100, 100, 9.5, AspectRatio::SQUARE, Rotation::None)?;
        assert!((params.zoom - MAX_ZOOM).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn empty_crop_rectangle_is_rejected() {
        let params = CropParams::new(0, 0, 0, 100, 1.0, AspectRatio::SQUARE, Rotation::None);
        assert!(params.is_err());
    }

    #[test]
    fn centered_square_centers_on_the_larger_axis() {
        let params = CropParams::centered_square(1024, 512);
        assert_eq!(params.x, 256);
        assert_eq!(params.y, 0);
        assert_eq!(params.width, 512);
        assert_eq!(params.height, 512);
    }

    #[test]
    fn rotation_cycles_through_quarter_turns() {
        let full_turn = Rotation::None
            .next_quarter()
            .next_quarter()
            .next_quarter()
            .next_quarter();
        assert_eq!(full_turn, Rotation::None);
        assert_eq!(Rotation::ThreeQuarter.degrees(), 270);
    }
}
