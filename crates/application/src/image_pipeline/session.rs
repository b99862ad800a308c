use std::collections::HashSet;

use amora_domain::ImageDigest;

/// Session-scoped duplicate-photo detection.
///
/// Owned by the pipeline instance rather than shared globally, so two
/// pipelines (two tabs, or parallel tests) never observe each other's
/// digests.
#[derive(Debug, Default)]
pub struct SessionDedup {
    seen: HashSet<ImageDigest>,
}

impl SessionDedup {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the digest was already recorded this session.
    #[must_use]
    pub fn contains(&self, digest: &ImageDigest) -> bool {
        self.seen.contains(digest)
    }

    /// Records a digest after the photo has been accepted.
    pub fn record(&mut self, digest: ImageDigest) {
        self.seen.insert(digest);
    }

    /// Number of distinct photos seen this session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true when nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
