//! Upload validation and progress accounting.

use amora_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Minimum width and height of an accepted photo, in pixels.
pub const MIN_IMAGE_DIMENSION: u32 = 512;

/// Maximum accepted raw file size: 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A file the user selected for upload, before any processing.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// Original file name.
    pub file_name: String,
    /// MIME type reported for the file.
    pub content_type: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    /// Creates a selected file.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Content digest of the raw file, used for session-scoped duplicate
    /// detection.
    #[must_use]
    pub fn digest(&self) -> ImageDigest {
        ImageDigest::of(self.bytes.as_slice())
    }
}

/// SHA-256 digest of a file's raw content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDigest(String);

impl ImageDigest {
    /// Computes the digest of the given bytes.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        Self(
            digest
                .iter()
                .map(|byte| format!("{byte:02x}"))
                .collect::<String>(),
        )
    }

    /// Returns the hex-encoded digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Rejects files that are not images.
pub fn validate_content_type(content_type: &str) -> AppResult<()> {
    if !content_type.starts_with("image/") {
        return Err(AppError::Validation(
            "invalid file type: please select an image".to_owned(),
        ));
    }

    Ok(())
}

/// Rejects files above the size limit.
pub fn validate_file_size(byte_count: usize, max_bytes: usize) -> AppResult<()> {
    if byte_count > max_bytes {
        return Err(AppError::Validation(format!(
            "file is too large: the limit is {} MB",
            max_bytes / (1024 * 1024)
        )));
    }

    Ok(())
}

/// Rejects decoded images below the minimum dimensions.
pub fn validate_dimensions(width: u32, height: u32, min_dimension: u32) -> AppResult<()> {
    if width < min_dimension || height < min_dimension {
        return Err(AppError::Validation(format!(
            "photo must be at least {min_dimension}x{min_dimension} pixels \
             (got {width}x{height})"
        )));
    }

    Ok(())
}

/// Transfer progress for one in-flight upload.
///
/// Speed and ETA are derived on every tick rather than stored, so a stalled
/// transfer immediately shows a growing estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Bytes transferred so far.
    pub bytes_sent: u64,
    /// Total bytes to transfer.
    pub total_bytes: u64,
    /// Milliseconds elapsed since the transfer started.
    pub elapsed_ms: u64,
}

impl UploadProgress {
    /// Fraction of the transfer completed, in `0.0..=1.0`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let fraction = self.bytes_sent as f64 / self.total_bytes as f64;
        fraction.min(1.0)
    }

    /// Transfer speed in bytes per millisecond, if measurable yet.
    #[must_use]
    pub fn bytes_per_ms(&self) -> Option<f64> {
        if self.elapsed_ms == 0 || self.bytes_sent == 0 {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        Some(self.bytes_sent as f64 / self.elapsed_ms as f64)
    }

    /// Estimated milliseconds remaining, if a speed estimate exists.
    #[must_use]
    pub fn eta_ms(&self) -> Option<u64> {
        let speed = self.bytes_per_ms()?;
        let remaining = self.total_bytes.saturating_sub(self.bytes_sent);
        #[allow(clippy::cast_precision_loss)]
        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        Some((remaining as f64 / speed).round() as u64)
    }

    /// ETA formatted for display: `"42s"`, or `"2m 05s"` beyond a minute.
    #[must_use]
    pub fn format_eta(&self) -> Option<String> {
        let total_seconds = self.eta_ms()?.div_ceil(1000);
        if total_seconds < 60 {
            return Some(format!("{total_seconds}s"));
        }

        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        Some(format!("{minutes}m {seconds:02}s"))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ImageDigest, MAX_UPLOAD_BYTES, MIN_IMAGE_DIMENSION, UploadProgress,
        validate_content_type, validate_dimensions, validate_file_size,
    };

    #[test]
    fn content_type_must_be_an_image() {
        assert!(validate_content_type("image/jpeg").is_ok());
        assert!(validate_content_type("image/png").is_ok());
        assert!(validate_content_type("application/pdf").is_err());
        assert!(validate_content_type("video/mp4").is_err());
    }

    #[test]
    fn oversized_files_are_rejected() {
        assert!(validate_file_size(MAX_UPLOAD_BYTES, MAX_UPLOAD_BYTES).is_ok());
        assert!(validate_file_size(MAX_UPLOAD_BYTES + 1, MAX_UPLOAD_BYTES).is_err());
    }

    #[test]
    fn undersized_photos_are_rejected() {
        assert!(validate_dimensions(512, 512, MIN_IMAGE_DIMENSION).is_ok());
        assert!(validate_dimensions(511, 2000, MIN_IMAGE_DIMENSION).is_err());
        assert!(validate_dimensions(2000, 300, MIN_IMAGE_DIMENSION).is_err());
    }

    #[test]
    fn identical_content_hashes_identically() {
        let first = ImageDigest::of(b"same bytes");
        let second = ImageDigest::of(b"same bytes");
        let other = ImageDigest::of(b"different bytes");
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn progress_derives_speed_and_eta() {
        let progress = UploadProgress {
            bytes_sent: 1_000,
            total_bytes: 4_000,
            elapsed_ms: 500,
        };

        assert!((progress.fraction() - 0.25).abs() < f64::EPSILON);
        assert_eq!(progress.bytes_per_ms(), Some(2.0));
        // 3000 bytes remaining at 2 bytes/ms -> 1500 ms -> rounds up to 2s.
        assert_eq!(progress.eta_ms(), Some(1_500));
        assert_eq!(progress.format_eta(), Some("2s".to_owned()));
    }

    #[test]
    fn eta_beyond_a_minute_uses_minutes_and_seconds() {
        let progress = UploadProgress {
            bytes_sent: 1_000,
            total_bytes: 126_000,
            elapsed_ms: 1_000,
        };

        // 125000 bytes remaining at 1 byte/ms -> 125 s.
        assert_eq!(progress.format_eta(), Some("2m 05s".to_owned()));
    }

    #[test]
    fn progress_without_elapsed_time_has_no_estimates() {
        let progress = UploadProgress {
            bytes_sent: 0,
            total_bytes: 100,
            elapsed_ms: 0,
        };

        assert_eq!(progress.bytes_per_ms(), None);
        assert_eq!(progress.format_eta(), None);
    }
}
