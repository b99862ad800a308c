//! Rate limiting ports and application service.
//!
//! Every mutating operation in the system consults this fixed-window limiter
//! before writing, keyed by an `"{category}:{identity}"` composite so
//! unrelated callers never contend on a shared bucket.

mod config;
mod ports;
mod service;


pub use config::{RateLimitRule, operation_rules};
pub use ports::RateLimitRepository;
pub use service::RateLimitService;
