//! Page-visibility signal as seen by the scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityState {
    pub visible: bool,
    /// When the current state began.
    pub since: Instant,
    /// Length of the hidden period that ended with the last hidden -> visible
    /// transition. `None` while hidden or before any such transition.
    pub last_hidden_for: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Visibility {
    tx: Arc<watch::Sender<VisibilityState>>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Visibility {
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(VisibilityState {
            visible,
            since: Instant::now(),
            last_hidden_for: None,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Returns true if the state changed.
    pub fn set_visible(&self, visible: bool) -> bool {
        let now = Instant::now();
        self.tx.send_if_modified(|s| {
            if s.visible == visible {
                return false;
            }
            s.last_hidden_for = if visible {
                Some(now.saturating_duration_since(s.since))
            } else {
                None
            };
            s.visible = visible;
            s.since = now;
            true
        })
    }

    pub fn is_visible(&self) -> bool {
        self.tx.borrow().visible
    }

    pub fn state(&self) -> VisibilityState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<VisibilityState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn records_hidden_duration_on_return() {
        let v = Visibility::new(true);
        assert!(v.set_visible(false));
        assert!(!v.set_visible(false));
        assert_eq!(v.state().last_hidden_for, None);
        tokio::time::advance(Duration::from_secs(12)).await;
        assert!(v.set_visible(true));
        assert_eq!(v.state().last_hidden_for, Some(Duration::from_secs(12)));
        assert!(v.is_visible());
    }
}
