//! Freshness-windowed cache of issued links.
//!
//! Expired entries are not evicted; a lookup past the window is simply a miss
//! and the next insert for the key overwrites the entry.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::resource::ResourceClass;

/// (item, file-or-whole-item, class).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub item_id: u64,
    pub file_id: Option<u64>,
    pub class: ResourceClass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedLink {
    pub url: String,
    pub issued_at: Instant,
}

#[derive(Debug)]
pub struct LinkCache {
    freshness: Duration,
    entries: HashMap<LinkKey, CachedLink>,
}

impl LinkCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            freshness,
            entries: HashMap::new(),
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub fn get(&self, key: &LinkKey) -> Option<&str> {
        self.get_at(key, Instant::now())
    }

    /// Hit only while `now - issued_at <= freshness`.
    pub fn get_at(&self, key: &LinkKey, now: Instant) -> Option<&str> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.issued_at) <= self.freshness {
            Some(&entry.url)
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: LinkKey, url: impl Into<String>) {
        self.insert_at(key, url, Instant::now());
    }

    pub fn insert_at(&mut self, key: LinkKey, url: impl Into<String>, issued_at: Instant) {
        self.entries.insert(
            key,
            CachedLink {
                url: url.into(),
                issued_at,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
