//! Download-link acquisition: freshness cache, history read-through, and the
//! rate-limited, retried upstream request.

mod acquire;
mod cache;
mod sanitize;

pub use acquire::{DownloadTask, IssuedLink, LinkAcquirer, LinkSource};
pub use cache::{CachedLink, LinkCache, LinkKey};
pub use sanitize::{sanitize_download_name, with_filename};
