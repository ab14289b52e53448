//! Per-class fetch cycles: admission, fetch, ownership check, commit.

mod engine;
mod state;
mod validate;

pub use engine::{SyncEngine, SyncOptions};
pub use state::SyncFailure;
pub use validate::OwnerPin;

#[cfg(test)]
mod tests;
