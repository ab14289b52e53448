//! API and transport errors.

/// Failure below HTTP: the request never produced a status code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connect or total timeout elapsed.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// DNS, refused connection, reset, empty reply.
    #[error("connection failed: {0}")]
    Connection(String),
    /// Anything else (invalid URL, worker join failure, ...).
    #[error("transport error: {0}")]
    Other(String),
}

/// Error returned by a single API call.
///
/// Kept free of retry decisions; see `retry::classify` for how each variant
/// maps onto the error taxonomy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Non-2xx response; `error`/`detail` are read from the body when it is JSON.
    #[error("HTTP {status}{}", describe(.error, .detail))]
    Status {
        status: u16,
        error: Option<String>,
        detail: Option<String>,
    },
    /// 2xx response with `success: false`.
    #[error("request rejected{}", describe(.error, .detail))]
    Rejected {
        error: Option<String>,
        detail: Option<String>,
    },
    /// 2xx response whose body could not be decoded at all.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Payload decoded but failed the shape or ownership check.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl ApiError {
    /// Upstream-provided messages, used for permanent-error matching.
    pub fn upstream_messages(&self) -> Vec<&str> {
        match self {
            ApiError::Status { error, detail, .. } | ApiError::Rejected { error, detail } => {
                error.iter().chain(detail.iter()).map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn describe(error: &Option<String>, detail: &Option<String>) -> String {
    match (error.as_deref(), detail.as_deref()) {
        (Some(e), Some(d)) => format!(": {e} ({d})"),
        (Some(e), None) => format!(": {e}"),
        (None, Some(d)) => format!(": {d}"),
        (None, None) => String::new(),
    }
}
