use async_trait::async_trait;
use chrono::{DateTime, Utc};

use amora_core::AppResult;
use amora_domain::RateLimitDecision;

/// Repository port for rate limit persistence.
///
/// Implementations must apply the fixed-window transition from
/// [`amora_domain::RateLimitRecord::observe`] atomically per key: a
/// read-then-write race between two callers on the same key must not admit
/// more than `max_requests` per window. The Postgres adapter relies on a
/// row lock, the Redis adapter on a Lua script, and the in-memory adapter on
/// a mutex.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Observes one request for the given key and decides admission.
    ///
    /// Creates the record on first use; hard-resets it when the window has
    /// expired; never advances the counter for denied requests.
    async fn check(
        &self,
        key: &str,
        window_ms: i64,
        max_requests: u32,
    ) -> AppResult<RateLimitDecision>;

    /// Removes entries whose window started before the given cutoff.
    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64>;
}
