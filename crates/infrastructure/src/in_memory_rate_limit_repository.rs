//! In-memory rate limit repository for tests and single-node development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use amora_application::RateLimitRepository;
use amora_core::AppResult;
use amora_domain::{RateLimitDecision, RateLimitRecord};

/// Mutex-guarded map applying the domain transition directly.
///
/// The single mutex serializes all callers, which makes the per-key
/// read-modify-write trivially atomic.
#[derive(Default)]
pub struct InMemoryRateLimitRepository {
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl InMemoryRateLimitRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitRepository for InMemoryRateLimitRepository {
    async fn check(
        &self,
        key: &str,
        window_ms: i64,
        max_requests: u32,
    ) -> AppResult<RateLimitDecision> {
        let now_ms = Utc::now().timestamp_millis();
        let mut records = self.records.lock().await;
        match records.get_mut(key) {
            Some(record) => Ok(record.observe(now_ms, window_ms, max_requests)),
            None => {
                records.insert(key.to_owned(), RateLimitRecord::first_request(now_ms));
                Ok(RateLimitDecision::Allowed)
            }
        }
    }

    async fn cleanup_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let cutoff_ms = before.timestamp_millis();
        let mut records = self.records.lock().await;
        let before_len = records.len();
        records.retain(|_, record| record.window_started_at_ms >= cutoff_ms);
        Ok(u64::try_from(before_len - records.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use amora_application::RateLimitRepository;
    use amora_core::AppResult;
    use chrono::Utc;

    use super::InMemoryRateLimitRepository;

    #[tokio::test]
    async fn admits_up_to_the_budget_then_denies() -> AppResult<()> {
        let repository = InMemoryRateLimitRepository::new();
        for _ in 0..3 {
            let decision = repository.check("upload:user-1", 60_000, 3).await?;
            assert!(decision.is_allowed());
        }

        let denied = repository.check("upload:user-1", 60_000, 3).await?;
        assert!(!denied.is_allowed());
        Ok(())
    }

    #[tokio::test]
    async fn short_windows_reset() -> AppResult<()> {
        let repository = InMemoryRateLimitRepository::new();
        repository.check("k", 25, 1).await?;
        let denied = repository.check("k", 25, 1).await?;
        assert!(!denied.is_allowed());

        tokio::time::sleep(Duration::from_millis(40)).await;
        let after_reset = repository.check("k", 25, 1).await?;
        assert!(after_reset.is_allowed());
        Ok(())
    }

    #[tokio::test]
    async fn cleanup_removes_idle_records() -> AppResult<()> {
        let repository = InMemoryRateLimitRepository::new();
        repository.check("stale", 60_000, 5).await?;

        let removed = repository
            .cleanup_expired(Utc::now() + chrono::Duration::hours(1))
            .await?;
        assert_eq!(removed, 1);
        Ok(())
    }
}
