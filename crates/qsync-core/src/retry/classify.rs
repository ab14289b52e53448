//! Classify API and transport errors into retry policy error kinds.

use crate::api::{ApiError, TransportError};

use super::policy::ErrorKind;

/// Upstream error substrings that retrying cannot fix (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermanentErrors(Vec<String>);

impl Default for PermanentErrors {
    fn default() -> Self {
        Self::new([
            "not found",
            "insufficient storage",
            "DATABASE_ERROR",
            "BOZO_TORRENT",
            "ITEM_NOT_FOUND",
        ])
    }
}

impl PermanentErrors {
    pub fn new<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            needles
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, message: &str) -> bool {
        let haystack = message.to_lowercase();
        self.0.iter().any(|needle| haystack.contains(needle.as_str()))
    }
}

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        401 | 403 => ErrorKind::Auth(code),
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::Http5xx(code),
        _ => ErrorKind::Other,
    }
}

/// Classify a transport failure for retry decisions.
pub fn classify_transport(e: &TransportError) -> ErrorKind {
    match e {
        TransportError::Timeout(_) => ErrorKind::Timeout,
        TransportError::Connection(_) => ErrorKind::Connection,
        TransportError::Other(_) => ErrorKind::Other,
    }
}

/// Classify an API error. Auth wins over everything; then configured permanent
/// conditions found in `error`/`detail`; then the status code.
pub fn classify(e: &ApiError, permanent: &PermanentErrors) -> ErrorKind {
    if let Some(status @ (401 | 403)) = e.status() {
        return ErrorKind::Auth(status);
    }
    if e.upstream_messages().iter().any(|m| permanent.matches(m)) {
        return ErrorKind::Permanent;
    }
    match e {
        ApiError::Transport(t) => classify_transport(t),
        ApiError::Status { status, .. } => classify_http_status(*status),
        ApiError::Validation(_) => ErrorKind::Validation,
        ApiError::Rejected { .. } | ApiError::Malformed(_) => ErrorKind::Other,
    }
}
