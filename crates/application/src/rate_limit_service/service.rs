use std::sync::Arc;

use chrono::Utc;

use amora_core::{AppError, AppResult};
use amora_domain::RateLimitDecision;

use super::config::RateLimitRule;
use super::ports::RateLimitRepository;

/// Application service for rate limiting.
#[derive(Clone)]
pub struct RateLimitService {
    repository: Arc<dyn RateLimitRepository>,
}

impl RateLimitService {
    /// Creates a new rate limit service.
    #[must_use]
    pub fn new(repository: Arc<dyn RateLimitRepository>) -> Self {
        Self { repository }
    }

    /// Checks whether the given identity is within the rule's limit.
    ///
    /// The bucket key is `"{category}:{identity}"` where identity is
    /// typically a user id. Returns the decision; denial is not an error at
    /// this level so callers can surface a structured "try again in N
    /// seconds" response instead of a failure.
    pub async fn check_rate_limit(
        &self,
        rule: &RateLimitRule,
        identity: &str,
    ) -> AppResult<RateLimitDecision> {
        let composite_key = format!("{}:{identity}", rule.category);
        self.repository
            .check(composite_key.as_str(), rule.window_ms, rule.max_requests)
            .await
    }

    /// Like [`Self::check_rate_limit`] but maps denial to
    /// [`AppError::RateLimited`], for call sites that propagate errors.
    pub async fn enforce(&self, rule: &RateLimitRule, identity: &str) -> AppResult<()> {
        match self.check_rate_limit(rule, identity).await? {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Denied { retry_after_ms } => {
                Err(AppError::RateLimited { retry_after_ms })
            }
        }
    }

    /// Removes rate limit entries idle for more than a day. Intended for
    /// periodic cleanup from the worker.
    pub async fn cleanup(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::hours(24);
        self.repository.cleanup_expired(cutoff).await
    }
}
