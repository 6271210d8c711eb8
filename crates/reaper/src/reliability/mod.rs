//! Reliability patterns for remote calls
//!
//! This module provides:
//! - [`RetryPolicy`] - Fixed-backoff retry configuration with a timeout ceiling
//! - [`RetryExecutor`] - Runs an operation under a policy, honouring cancellation

mod executor;
mod retry;

pub use executor::{Cancelled, Outcome, RetryExecutor, RetryFailure};
pub(crate) use retry::duration_millis;
pub use retry::RetryPolicy;
