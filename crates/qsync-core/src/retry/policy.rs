use std::time::Duration;

/// Fine-grained classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Admission refused locally, or the server answered 429.
    RateLimited,
    /// Operation timed out (connect/read).
    Timeout,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Server-side failure (5xx).
    Http5xx(u16),
    /// 401 / 403.
    Auth(u16),
    /// Payload failed the shape or ownership check.
    Validation,
    /// Matched a configured non-retryable upstream condition.
    Permanent,
    /// Anything else; treated as transient.
    Other,
}

/// User-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimited,
    Transient,
    Permanent,
    Validation,
    Auth,
}

impl ErrorKind {
    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::RateLimited => ErrorClass::RateLimited,
            ErrorKind::Timeout | ErrorKind::Connection | ErrorKind::Http5xx(_) | ErrorKind::Other => {
                ErrorClass::Transient
            }
            ErrorKind::Auth(_) => ErrorClass::Auth,
            ErrorKind::Validation => ErrorClass::Validation,
            ErrorKind::Permanent => ErrorClass::Permanent,
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Compute the next backoff delay for a given attempt and error kind.
    ///
    /// `attempt` is 1-based (1 = first attempt). Returns `RetryDecision::NoRetry`
    /// when we should stop retrying.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::Auth(_) | ErrorKind::Permanent | ErrorKind::Validation => {
                RetryDecision::NoRetry
            }
            ErrorKind::Timeout
            | ErrorKind::Connection
            | ErrorKind::RateLimited
            | ErrorKind::Http5xx(_)
            | ErrorKind::Other => {
                // base * 2^(attempt-1), capped.
                let exp = 1u32 << attempt.saturating_sub(1).min(8);
                let raw = self.base_delay.saturating_mul(exp);
                RetryDecision::RetryAfter(raw.min(self.max_delay))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_for_auth_permanent_validation() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Auth(401)), RetryDecision::NoRetry);
        assert_eq!(p.decide(1, ErrorKind::Permanent), RetryDecision::NoRetry);
        assert_eq!(p.decide(1, ErrorKind::Validation), RetryDecision::NoRetry);
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let p = RetryPolicy {
            max_attempts: 20,
            ..RetryPolicy::default()
        };
        assert_eq!(
            p.decide(1, ErrorKind::Timeout),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            p.decide(2, ErrorKind::Http5xx(502)),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            p.decide(10, ErrorKind::Connection),
            RetryDecision::RetryAfter(p.max_delay)
        );
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy::default();
        assert!(matches!(p.decide(1, ErrorKind::Other), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(2, ErrorKind::Other), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3, ErrorKind::Other), RetryDecision::NoRetry);
    }

    #[test]
    fn kinds_map_onto_taxonomy() {
        assert_eq!(ErrorKind::Http5xx(503).class(), ErrorClass::Transient);
        assert_eq!(ErrorKind::Auth(403).class(), ErrorClass::Auth);
        assert_eq!(ErrorKind::RateLimited.class(), ErrorClass::RateLimited);
    }
}
