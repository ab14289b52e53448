pub mod config;
pub mod logging;

pub mod api;
pub mod autostart;
pub mod bulk;
pub mod control;
pub mod history;
pub mod item;
pub mod links;
pub mod poll;
pub mod rate_limit;
pub mod resource;
pub mod retry;
pub mod session;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
