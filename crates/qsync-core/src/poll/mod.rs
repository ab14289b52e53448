//! Adaptive polling: cadence selection, pause registry, visibility, and the
//! per-class timer loops.

mod cadence;
mod pause;
mod scheduler;
mod visibility;

pub use cadence::{cadence, BackgroundPolling, Cadence, PollConfig};
pub use pause::{PauseGuard, PauseReasons};
pub use scheduler::{PollTarget, PollingScheduler};
pub use visibility::{Visibility, VisibilityState};
