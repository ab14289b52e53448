//! CLI command handlers, one file per command.

mod bulk;
mod completions;
mod control;
mod history;
mod link;
mod list;
mod signal;
mod watch;

pub use bulk::run_bulk;
pub use completions::run_completions;
pub use control::run_control;
pub use history::run_history;
pub use link::run_link;
pub use list::{print_items, run_list};
pub use signal::run_signal;
pub use watch::run_watch;
