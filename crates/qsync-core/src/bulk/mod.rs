//! Bounded-concurrency bulk link acquisition.

mod coordinator;
pub(crate) mod guard;
mod progress;

pub use coordinator::{BulkDownloadCoordinator, BulkEvent, BulkReport, TaskOutcome};
pub use progress::BulkProgress;
