use std::fmt;
use std::sync::Arc;

use crate::item::Item;
use crate::resource::ResourceClass;
use crate::retry::{ErrorClass, RetryFailure};

/// Last reported failure for one class. Cleared by the next successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub class: ResourceClass,
    pub kind: ErrorClass,
    pub message: String,
}

impl SyncFailure {
    pub(crate) fn from_retry(class: ResourceClass, failure: &RetryFailure) -> Self {
        Self {
            class,
            kind: failure.class(),
            message: failure.error.to_string(),
        }
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

/// Everything the engine tracks for one concrete class.
#[derive(Debug, Default)]
pub(crate) struct ClassState {
    pub items: Arc<Vec<Item>>,
    pub error: Option<SyncFailure>,
    /// Fetches in flight that asked for the loading flag.
    pub loading: usize,
    /// Highest sequence number issued; only its response may commit.
    pub latest_seq: u64,
}
