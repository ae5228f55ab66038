//! Retry with classified failures and exponential backoff.
//!
//! The executor consults [`SyncFailure::is_retryable`] after every failed
//! attempt, so retry policy lives in one place (the classifier) instead of
//! being re-derived at each call site. Backoff is capped exponential with
//! additive jitter; cancellation is cooperative via a token checked at
//! every suspension point.
//!
//! [`SyncFailure::is_retryable`]: crate::failure::SyncFailure

pub mod backoff;
pub mod constants;
mod executor;

pub use executor::{InvalidRetryConfig, RetryExecutor};
