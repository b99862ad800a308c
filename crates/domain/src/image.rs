//! Profile image entities and the ordered image sequence.

use std::fmt::{Display, Formatter};

use amora_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Backend-issued stable identity for a persisted image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageId(String);

impl StorageId {
    /// Creates a validated storage identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "storage id must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for StorageId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// One photo in a user's profile gallery.
///
/// Images exist in two states: local-only (cropped and accepted client-side,
/// `storage_id` absent, URL pointing at a transient local object) and
/// persisted (`storage_id` assigned by the backend together with a durable
/// URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileImage {
    /// Stable identity once persisted; `None` for local-only images.
    pub storage_id: Option<StorageId>,
    /// Displayable URL: transient local reference or backend-issued.
    pub url: String,
    /// Original file name as selected by the user.
    pub file_name: String,
}

impl ProfileImage {
    /// Creates a local-only image that has not been uploaded yet.
    #[must_use]
    pub fn local(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            storage_id: None,
            url: url.into(),
            file_name: file_name.into(),
        }
    }

    /// Creates a persisted image with its backend-assigned identity.
    #[must_use]
    pub fn persisted(
        storage_id: StorageId,
        url: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            storage_id: Some(storage_id),
            url: url.into(),
            file_name: file_name.into(),
        }
    }

    /// Returns true once the backend has assigned a storage id.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.storage_id.is_some()
    }

    /// Stable comparison key: the storage id when persisted, the local URL
    /// otherwise.
    #[must_use]
    pub fn identity(&self) -> &str {
        match &self.storage_id {
            Some(storage_id) => storage_id.as_str(),
            None => self.url.as_str(),
        }
    }
}

/// Ordered gallery of one user's profile images.
///
/// Position is meaningful: index 0 is the primary photo. The sequence
/// enforces the per-user cap and rejects duplicate storage ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSequence {
    images: Vec<ProfileImage>,
    cap: usize,
}

impl ImageSequence {
    /// Creates an empty sequence with the given image cap.
    pub fn new(cap: usize) -> AppResult<Self> {
        if cap == 0 {
            return Err(AppError::Validation(
                "image cap must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            images: Vec::new(),
            cap,
        })
    }

    /// Returns the configured per-user image cap.
    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Returns the number of images in the sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns true when the sequence holds no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Returns true when the sequence is at its cap.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.images.len() >= self.cap
    }

    /// Returns the images in display order.
    #[must_use]
    pub fn images(&self) -> &[ProfileImage] {
        self.images.as_slice()
    }

    /// Returns the primary photo, if any.
    #[must_use]
    pub fn primary(&self) -> Option<&ProfileImage> {
        self.images.first()
    }

    /// Appends an image at the end of the sequence.
    ///
    /// Rejects additions beyond the cap and duplicate storage ids.
    pub fn push(&mut self, image: ProfileImage) -> AppResult<()> {
        if self.is_full() {
            return Err(AppError::Validation(format!(
                "you can add up to {} photos",
                self.cap
            )));
        }

        if let Some(storage_id) = &image.storage_id
            && self
                .images
                .iter()
                .any(|existing| existing.storage_id.as_ref() == Some(storage_id))
        {
            return Err(AppError::Conflict(format!(
                "photo {storage_id} is already in the gallery"
            )));
        }

        self.images.push(image);
        Ok(())
    }

    /// Removes the image with the given identity key and returns it.
    pub fn remove(&mut self, identity: &str) -> AppResult<ProfileImage> {
        let position = self
            .images
            .iter()
            .position(|image| image.identity() == identity)
            .ok_or_else(|| AppError::NotFound(format!("no photo with identity {identity}")))?;

        Ok(self.images.remove(position))
    }

    /// Replaces the ordering with `new_order`.
    ///
    /// The new ordering must contain exactly the current images (matched by
    /// identity); anything else indicates the caller raced a concurrent
    /// mutation and is rejected without touching the sequence.
    pub fn apply_order(&mut self, new_order: Vec<ProfileImage>) -> AppResult<()> {
        if new_order.len() != self.images.len() {
            return Err(AppError::Validation(
                "reordered gallery must contain exactly the current photos".to_owned(),
            ));
        }

        let mut remaining: Vec<&str> = self.images.iter().map(ProfileImage::identity).collect();
        for image in &new_order {
            let Some(position) = remaining
                .iter()
                .position(|identity| *identity == image.identity())
            else {
                return Err(AppError::Validation(format!(
                    "photo {} is not part of the gallery",
                    image.identity()
                )));
            };
            remaining.swap_remove(position);
        }

        self.images = new_order;
        Ok(())
    }

    /// Moves the image at `index` to the front, making it the primary photo.
    pub fn move_to_front(&mut self, index: usize) -> AppResult<()> {
        if index >= self.images.len() {
            return Err(AppError::NotFound(format!(
                "no photo at position {index}"
            )));
        }

        let image = self.images.remove(index);
        self.images.insert(0, image);
        Ok(())
    }

    /// Returns the ordered storage ids, or `None` while any image is still
    /// local-only. Persisting a partial order is never valid.
    #[must_use]
    pub fn storage_ids(&self) -> Option<Vec<StorageId>> {
        self.images
            .iter()
            .map(|image| image.storage_id.clone())
            .collect()
    }
}
