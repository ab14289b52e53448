//! Retry loop: run an async request until success or policy says stop.

use std::future::Future;

use crate::api::ApiError;

use super::classify::{classify, PermanentErrors};
use super::policy::{ErrorClass, ErrorKind, RetryDecision, RetryPolicy};

/// Final error after the retry loop gave up.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct RetryFailure {
    pub error: ApiError,
    pub kind: ErrorKind,
    pub attempts: u32,
}

impl RetryFailure {
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

/// Runs `f` until it succeeds or the retry policy says to stop.
/// `f` receives the 1-based attempt number. On a retryable failure the loop
/// sleeps for the backoff duration and tries again; permanent and auth
/// failures return immediately.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    permanent: &PermanentErrors,
    mut f: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 1u32;
    loop {
        match f(attempt).await {
            Ok(v) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "request succeeded after retry");
                }
                return Ok(v);
            }
            Err(error) => {
                let kind = classify(&error, permanent);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        return Err(RetryFailure {
                            error,
                            kind,
                            attempts: attempt,
                        });
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(
                            attempt,
                            max_attempts = policy.max_attempts,
                            backoff_ms = d.as_millis() as u64,
                            "retrying after {}",
                            error
                        );
                        tokio::time::sleep(d).await;
                        attempt += 1;
                    }
                }
            }
        }
    }
}
