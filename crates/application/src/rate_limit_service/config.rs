use amora_domain::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS};

/// Configuration for a rate limit rule.
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    /// The operation category name (e.g., "image:upload", "interest:send").
    pub category: String,
    /// Maximum number of requests admitted in one window.
    pub max_requests: u32,
    /// Window duration in milliseconds.
    pub window_ms: i64,
}

impl RateLimitRule {
    /// Creates a new rate limit rule.
    #[must_use]
    pub fn new(category: impl Into<String>, max_requests: u32, window_ms: i64) -> Self {
        Self {
            category: category.into(),
            max_requests,
            window_ms,
        }
    }

    /// Creates a rule with the default window and request budget.
    #[must_use]
    pub fn with_defaults(category: impl Into<String>) -> Self {
        Self::new(category, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS)
    }
}

/// Named rules for every mutating operation.
///
/// Upload-url issuance is deliberately more generous than the default so a
/// user filling an empty gallery is not throttled mid-flow; everything else
/// keeps the default five-per-minute budget.
pub mod operation_rules {
    use super::RateLimitRule;
    use amora_domain::DEFAULT_WINDOW_MS;

    /// Rule for upload-url issuance.
    #[must_use]
    pub fn generate_upload_url() -> RateLimitRule {
        RateLimitRule::new("image:upload-url", 10, DEFAULT_WINDOW_MS)
    }

    /// Rule for gallery order persistence.
    #[must_use]
    pub fn update_image_order() -> RateLimitRule {
        RateLimitRule::with_defaults("image:reorder")
    }

    /// Rule for image deletion.
    #[must_use]
    pub fn delete_image() -> RateLimitRule {
        RateLimitRule::with_defaults("image:delete")
    }

    /// Rule for sending an interest.
    #[must_use]
    pub fn send_interest() -> RateLimitRule {
        RateLimitRule::with_defaults("interest:send")
    }

    /// Rule for sending a message.
    #[must_use]
    pub fn send_message() -> RateLimitRule {
        RateLimitRule::with_defaults("message:send")
    }

    /// Rule for contact form submissions.
    #[must_use]
    pub fn contact_form() -> RateLimitRule {
        RateLimitRule::new("contact:submit", 3, DEFAULT_WINDOW_MS)
    }
}
