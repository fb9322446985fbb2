//! Resilience patterns for lyra-runtime.
//!
//! This module provides:
//! - Retry policy with exponential backoff (driven by `backon`)
//! - Wall-clock deadlines for units and runs

mod deadline;
mod retry;

pub use deadline::Deadline;
pub use retry::RetryPolicy;
