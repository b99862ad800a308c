//! Redis-backed rate limit repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::Script;

use amora_application::RateLimitRepository;
use amora_core::{AppError, AppResult};
use amora_domain::RateLimitDecision;

// Applies the fixed-window transition atomically: create or hard-reset the
// bucket when the window has elapsed, increment only below the budget, and
// report the window start for retry-delay computation. Keys expire at twice
// the window so idle buckets clean themselves up.
const CHECK_SCRIPT: &str = r#"
local key = KEYS[1]
local window_ms = tonumber(ARGV[1])
local max_requests = tonumber(ARGV[2])
local now_ms = tonumber(ARGV[3])

local window_start = tonumber(redis.call('HGET', key, 'window_started_at_ms'))
local count = tonumber(redis.call('HGET', key, 'count'))

if (not window_start) or (now_ms - window_start > window_ms) then
  redis.call('HSET', key, 'window_started_at_ms', now_ms, 'count', 1)
  redis.call('PEXPIRE', key, window_ms * 2)
  return {1, now_ms}
end

if count < max_requests then
  redis.call('HINCRBY', key, 'count', 1)
  return {1, window_start}
end

return {0, window_start}
"#;

/// Redis implementation of the rate limit repository port.
#[derive(Clone)]
pub struct RedisRateLimitRepository {
    client: redis::Client,
    key_prefix: String,
}

impl RedisRateLimitRepository {
    /// Creates a repository with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }
}

#[async_trait]
impl RateLimitRepository for RedisRateLimitRepository {
    async fn check(
        &self,
        key: &str,
        window_ms: i64,
        max_requests: u32,
    ) -> AppResult<RateLimitDecision> {
        if window_ms <= 0 {
            return Err(AppError::Validation(
                "window_ms must be greater than zero".to_owned(),
            ));
        }

        let redis_key = self.key_for(key);
        let now_ms = Utc::now().timestamp_millis();

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let script = Script::new(CHECK_SCRIPT);
        let (allowed, window_started_at_ms): (i64, i64) = script
            .key(redis_key)
            .arg(window_ms)
            .arg(max_requests)
            .arg(now_ms)
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to check redis rate limit: {error}"))
            })?;

        if allowed == 1 {
            return Ok(RateLimitDecision::Allowed);
        }

        Ok(RateLimitDecision::Denied {
            retry_after_ms: (window_started_at_ms + window_ms - now_ms).max(0),
        })
    }

    async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
        // Redis rate limit keys expire automatically via TTL.
        Ok(0)
    }
}
