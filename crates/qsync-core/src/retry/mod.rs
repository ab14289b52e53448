//! Retry and backoff policy.
//!
//! This module encapsulates error classification (rate limiting, timeouts,
//! auth, permanent upstream conditions) and exponential backoff decisions so
//! that the sync engine and link acquisition share one consistent policy.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_http_status, classify_transport, PermanentErrors};
pub use policy::{ErrorClass, ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryFailure};
