//! Durable link-issuance history (SQLite via sqlx).
//!
//! One row per issued download link, keyed by credential fingerprint, class,
//! item and file. The in-memory link cache reads through to it on a miss.

mod db;
mod records;
mod types;

pub use db::{unix_millis, HistoryStore};
pub use types::{HistoryEntry, HistoryRecord};
