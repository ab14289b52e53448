use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do while hidden and no fast-path override holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundPolling {
    /// No timer at all.
    #[default]
    Stop,
    /// Keep polling at the inactive interval.
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub active_interval: Duration,
    pub inactive_interval: Duration,
    /// Hidden time after which becoming visible triggers one immediate sync.
    pub hidden_resync_threshold: Duration,
    pub background: BackgroundPolling,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            active_interval: Duration::from_secs(15),
            inactive_interval: Duration::from_secs(60),
            hidden_resync_threshold: Duration::from_secs(10),
            background: BackgroundPolling::Stop,
        }
    }
}

/// Effective polling state for one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// At least one pause reason is asserted; no timer runs.
    Suspended,
    /// Visible: short interval.
    Active(Duration),
    /// Hidden, but the class's fast-path override holds: short interval.
    Background(Duration),
    /// Hidden, slow background polling.
    Inactive(Duration),
    /// Hidden and idle; no timer runs.
    Stopped,
}

impl Cadence {
    /// Delay before the next tick, or `None` when no timer should be armed.
    pub fn interval(self) -> Option<Duration> {
        match self {
            Cadence::Active(d) | Cadence::Background(d) | Cadence::Inactive(d) => Some(d),
            Cadence::Suspended | Cadence::Stopped => None,
        }
    }
}

/// Pure cadence decision. Pause wins over everything, then visibility, then
/// the fast-path override, then the background policy.
pub fn cadence(paused: bool, visible: bool, fast_path: bool, config: &PollConfig) -> Cadence {
    if paused {
        return Cadence::Suspended;
    }
    if visible {
        return Cadence::Active(config.active_interval);
    }
    if fast_path {
        return Cadence::Background(config.active_interval);
    }
    match config.background {
        BackgroundPolling::Stop => Cadence::Stopped,
        BackgroundPolling::Slow => Cadence::Inactive(config.inactive_interval),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_suspends_regardless_of_visibility() {
        let cfg = PollConfig::default();
        for visible in [true, false] {
            for fast in [true, false] {
                assert_eq!(cadence(true, visible, fast, &cfg), Cadence::Suspended);
            }
        }
    }

    #[test]
    fn visible_is_active() {
        let cfg = PollConfig::default();
        assert_eq!(
            cadence(false, true, false, &cfg),
            Cadence::Active(Duration::from_secs(15))
        );
    }

    #[test]
    fn hidden_with_override_keeps_short_interval() {
        let cfg = PollConfig::default();
        let c = cadence(false, false, true, &cfg);
        assert_eq!(c, Cadence::Background(Duration::from_secs(15)));
        assert_eq!(c.interval(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn hidden_idle_follows_background_policy() {
        let mut cfg = PollConfig::default();
        assert_eq!(cadence(false, false, false, &cfg), Cadence::Stopped);
        assert_eq!(Cadence::Stopped.interval(), None);
        cfg.background = BackgroundPolling::Slow;
        assert_eq!(
            cadence(false, false, false, &cfg),
            Cadence::Inactive(Duration::from_secs(60))
        );
    }
}
