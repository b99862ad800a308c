//! Fixed-window rate limiting state.
//!
//! One logical record exists per bucket key. Every store (Postgres, Redis,
//! in-memory) applies the same transition implemented by
//! [`RateLimitRecord::observe`], so the admission rules live in exactly one
//! place.

use serde::{Deserialize, Serialize};

/// Default window length for mutation buckets: one minute.
pub const DEFAULT_WINDOW_MS: i64 = 60_000;

/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Counter state for one bucket key.
///
/// The record is overwritten in place when its window expires; it is never
/// replaced by a new entity, and it is never deleted as part of normal
/// operation (periodic cleanup removes long-idle rows only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    /// Start of the current fixed window, in Unix milliseconds.
    pub window_started_at_ms: i64,
    /// Requests admitted in the current window. Always at least 1.
    pub count: u32,
}

/// Outcome of observing one request against a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request is within the limit and may proceed.
    Allowed,
    /// The request exceeds the limit for the current window.
    Denied {
        /// Milliseconds until the current window expires.
        retry_after_ms: i64,
    },
}

impl RateLimitDecision {
    /// Returns true when the request was admitted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Returns the retry delay for denied requests.
    #[must_use]
    pub fn retry_after_ms(&self) -> Option<i64> {
        match self {
            Self::Allowed => None,
            Self::Denied { retry_after_ms } => Some(*retry_after_ms),
        }
    }
}

impl RateLimitRecord {
    /// Creates the record for a key's first observed request.
    #[must_use]
    pub fn first_request(now_ms: i64) -> Self {
        Self {
            window_started_at_ms: now_ms,
            count: 1,
        }
    }

    /// Applies one request to the record and decides admission.
    ///
    /// This is a fixed window, not a sliding one: when the window has fully
    /// elapsed the counter hard-resets to 1, so a burst straddling the
    /// boundary can observe up to twice the nominal rate. That behavior is
    /// intentional and must not be tightened here.
    ///
    /// Denied requests do not advance the counter, so `count` never exceeds
    /// `max_requests` and `window_started_at_ms` only moves forward on full
    /// resets.
    pub fn observe(
        &mut self,
        now_ms: i64,
        window_ms: i64,
        max_requests: u32,
    ) -> RateLimitDecision {
        if now_ms - self.window_started_at_ms > window_ms {
            self.window_started_at_ms = now_ms;
            self.count = 1;
            return RateLimitDecision::Allowed;
        }

        if self.count < max_requests {
            self.count += 1;
            return RateLimitDecision::Allowed;
        }

        RateLimitDecision::Denied {
            retry_after_ms: self.window_started_at_ms + window_ms - now_ms,
        }
    }
}
