//! Resilience
//!
//! Retry support for unreliable calls to the identity provider.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy, RetryStats, DEFAULT_RETRY_CONFIG};
