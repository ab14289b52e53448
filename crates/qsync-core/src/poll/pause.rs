//! Named pause reasons shared by composition.
//!
//! Any feature can assert a reason (`"videoPlayer"`, `"bulk"`, ...); polling
//! runs only while the set is empty. Reasons are a set, so asserting the same
//! name twice is idempotent and one retraction clears it.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct PauseReasons {
    tx: Arc<watch::Sender<BTreeSet<String>>>,
}

impl Default for PauseReasons {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(BTreeSet::new());
        Self { tx: Arc::new(tx) }
    }
}

impl PauseReasons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the reason was not already asserted.
    pub fn assert_pause(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let added = self.tx.send_if_modified(|set| set.insert(reason.clone()));
        if added {
            tracing::debug!(reason = %reason, "pause asserted");
        }
        added
    }

    /// Returns true if the reason was present.
    pub fn retract_pause(&self, reason: &str) -> bool {
        let removed = self.tx.send_if_modified(|set| set.remove(reason));
        if removed {
            tracing::debug!(reason = %reason, "pause retracted");
        }
        removed
    }

    pub fn is_paused(&self) -> bool {
        !self.tx.borrow().is_empty()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.tx.borrow().iter().cloned().collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<BTreeSet<String>> {
        self.tx.subscribe()
    }

    /// Asserts `reason` until the returned guard is dropped.
    pub fn guard(&self, reason: impl Into<String>) -> PauseGuard {
        let reason = reason.into();
        self.assert_pause(reason.clone());
        PauseGuard {
            reasons: self.clone(),
            reason,
        }
    }
}

/// Retracts its reason on drop.
#[derive(Debug)]
pub struct PauseGuard {
    reasons: PauseReasons,
    reason: String,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.reasons.retract_pause(&self.reason);
    }
}
