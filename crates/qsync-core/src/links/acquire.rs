//! `get_or_request_link`: cache, then history, then upstream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use super::cache::{LinkCache, LinkKey};
use super::sanitize::with_filename;
use crate::api::{QueueApi, Transport};
use crate::config::QsyncConfig;
use crate::history::{unix_millis, HistoryEntry, HistoryRecord, HistoryStore};
use crate::item::Item;
use crate::rate_limit::RateLimiter;
use crate::resource::ResourceClass;
use crate::retry::{run_with_retry, PermanentErrors, RetryFailure, RetryPolicy};

/// One unit of link work: a whole item (archive) or one file of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub class: ResourceClass,
    pub item_id: u64,
    pub file_id: Option<u64>,
    /// Display name appended to the link as `filename`.
    pub name: Option<String>,
}

impl DownloadTask {
    pub fn item(class: ResourceClass, item_id: u64, name: Option<String>) -> Self {
        Self {
            class,
            item_id,
            file_id: None,
            name,
        }
    }

    pub fn file(class: ResourceClass, item_id: u64, file_id: u64, name: Option<String>) -> Self {
        Self {
            class,
            item_id,
            file_id: Some(file_id),
            name,
        }
    }

    /// One task per item, or with `per_file` one per file (items without a
    /// file list still get a whole-item task).
    pub fn for_items(class: ResourceClass, items: &[Item], per_file: bool) -> Vec<Self> {
        let mut tasks = Vec::new();
        for item in items {
            if per_file && !item.files.is_empty() {
                tasks.extend(
                    item.files
                        .iter()
                        .map(|f| Self::file(class, item.id, f.id, Some(f.name.clone()))),
                );
            } else {
                tasks.push(Self::item(class, item.id, Some(item.name.clone())));
            }
        }
        tasks
    }

    pub fn key(&self) -> LinkKey {
        LinkKey {
            item_id: self.item_id,
            file_id: self.file_id,
            class: self.class,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    Cache,
    History,
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedLink {
    pub key: LinkKey,
    /// User-facing URL, with the sanitized filename appended when known.
    pub url: String,
    pub source: LinkSource,
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

pub struct LinkAcquirer<T> {
    api: QueueApi<T>,
    cache: Mutex<LinkCache>,
    /// One async lock per key with a resolution in progress.
    in_flight: Mutex<HashMap<LinkKey, KeyLock>>,
    limiter: RateLimiter<ResourceClass>,
    retry: RetryPolicy,
    permanent: PermanentErrors,
    history: Option<HistoryStore>,
    fingerprint: String,
}

impl<T: Transport> LinkAcquirer<T> {
    pub fn new(api: QueueApi<T>, config: &QsyncConfig, history: Option<HistoryStore>) -> Self {
        let fingerprint = api.credential().fingerprint();
        Self {
            api,
            cache: Mutex::new(LinkCache::new(config.link_freshness())),
            in_flight: Mutex::new(HashMap::new()),
            limiter: RateLimiter::new(config.link_rate_limit()),
            retry: config.retry_policy(),
            permanent: config.permanent(),
            history,
            fingerprint,
        }
    }

    fn cache(&self) -> MutexGuard<'_, LinkCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn history(&self) -> Option<&HistoryStore> {
        self.history.as_ref()
    }

    pub fn cached(&self, key: &LinkKey) -> Option<String> {
        self.cache().get(key).map(str::to_string)
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<LinkKey, KeyLock>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key_lock(&self, key: LinkKey) -> KeyLock {
        Arc::clone(self.in_flight().entry(key).or_default())
    }

    /// Drops the key's lock entry once no other caller holds a handle to it.
    fn release_key(&self, key: &LinkKey, lock: KeyLock) {
        let mut in_flight = self.in_flight();
        // map entry + ours
        if Arc::strong_count(&lock) <= 2 {
            in_flight.remove(key);
        }
    }

    /// Returns a usable link for `task`, issuing a new one only when neither
    /// the cache nor the history store holds a fresh one. Concurrent misses
    /// for one key share a single upstream request; later callers see the
    /// first caller's link as a cache hit.
    pub async fn get_or_request_link(&self, task: &DownloadTask) -> Result<IssuedLink, RetryFailure> {
        let key = task.key();

        let resolved = match self.cached(&key) {
            Some(url) => Ok((url, LinkSource::Cache)),
            None => {
                let lock = self.key_lock(key);
                let resolved = {
                    let _held = lock.lock().await;
                    self.resolve_miss(task, key).await
                };
                self.release_key(&key, lock);
                resolved
            }
        };
        let (raw, source) = resolved?;

        tracing::debug!(
            class = %key.class,
            item_id = key.item_id,
            file_id = ?key.file_id,
            ?source,
            "link resolved"
        );

        Ok(IssuedLink {
            key,
            url: with_filename(&raw, task.name.as_deref()),
            source,
        })
    }

    /// Runs under the key lock: another caller may have filled the cache
    /// while this one waited.
    async fn resolve_miss(
        &self,
        task: &DownloadTask,
        key: LinkKey,
    ) -> Result<(String, LinkSource), RetryFailure> {
        if let Some(url) = self.cached(&key) {
            return Ok((url, LinkSource::Cache));
        }
        if let Some(url) = self.from_history(&key).await {
            return Ok((url, LinkSource::History));
        }
        let url = self.request(key).await?;
        self.remember(task, &url).await;
        Ok((url, LinkSource::Upstream))
    }

    async fn request(&self, key: LinkKey) -> Result<String, RetryFailure> {
        run_with_retry(&self.retry, &self.permanent, move |_attempt| async move {
            self.limiter.acquire(&key.class).await;
            self.api
                .request_link(key.class, key.item_id, key.file_id)
                .await
        })
        .await
    }

    async fn from_history(&self, key: &LinkKey) -> Option<String> {
        let store = self.history.as_ref()?;
        let row = match store
            .latest_for(&self.fingerprint, key.class, key.item_id, key.file_id)
            .await
        {
            Ok(row) => row?,
            Err(e) => {
                tracing::warn!("history lookup failed: {e:#}");
                return None;
            }
        };

        let age = Duration::from_millis(unix_millis().saturating_sub(row.issued_at).max(0) as u64);
        let mut cache = self.cache();
        if age > cache.freshness() {
            return None;
        }
        let now = Instant::now();
        let issued_at = now.checked_sub(age).unwrap_or(now);
        cache.insert_at(*key, row.url.clone(), issued_at);
        Some(row.url)
    }

    async fn remember(&self, task: &DownloadTask, url: &str) {
        self.cache().insert(task.key(), url);

        let Some(store) = &self.history else {
            return;
        };
        let entry = HistoryEntry {
            credential: self.fingerprint.clone(),
            class: task.class,
            item_id: task.item_id,
            file_id: task.file_id,
            url: url.to_string(),
            issued_at: unix_millis(),
            name: task.name.clone(),
        };
        if let Err(e) = store.record(&entry).await {
            tracing::warn!(item_id = task.item_id, "failed to persist link history: {e:#}");
        }
    }

    /// Newest-first issuance history for this credential; empty without a store.
    pub async fn refresh_history(&self, limit: u32) -> anyhow::Result<Vec<HistoryRecord>> {
        match &self.history {
            Some(store) => store.list_recent(&self.fingerprint, limit).await,
            None => Ok(Vec::new()),
        }
    }

    /// Drop cached links and rate-limit history.
    pub fn reset(&self) {
        self.cache().clear();
        self.in_flight().clear();
        self.limiter.reset();
    }

    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }
}
