//! The sync engine owns per-class item lists for one credential.
//!
//! `sync` never fails: refusals return the previous snapshot, failures are
//! recorded per class and yield an empty result while the stale list stays
//! visible. Every admitted fetch is stamped with a per-class sequence number
//! and only the latest one may commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use super::state::{ClassState, SyncFailure};
use super::validate::OwnerPin;
use crate::api::{ControlOp, QueueApi, Transport};
use crate::autostart::AutoStartMonitor;
use crate::config::{AutoStartConfig, QsyncConfig};
use crate::item::Item;
use crate::poll::PollTarget;
use crate::rate_limit::RateLimiter;
use crate::resource::{ResourceClass, Scope};
use crate::retry::{run_with_retry, ErrorClass, PermanentErrors, RetryFailure, RetryPolicy};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Ask upstream to skip its response cache.
    pub bypass_cache: bool,
    /// Background ticks don't toggle the loading flag.
    pub skip_loading_flag: bool,
}

impl SyncOptions {
    pub fn background() -> Self {
        Self {
            bypass_cache: false,
            skip_loading_flag: true,
        }
    }
}

type Fetched = (Vec<Item>, Option<String>);

pub struct SyncEngine<T> {
    api: QueueApi<T>,
    limiter: RateLimiter<ResourceClass>,
    retry: RetryPolicy,
    permanent: PermanentErrors,
    owner: OwnerPin,
    autostart: Mutex<AutoStartMonitor>,
    states: Mutex<HashMap<ResourceClass, ClassState>>,
    changes: watch::Sender<u64>,
    disposed: AtomicBool,
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(api: QueueApi<T>, config: &QsyncConfig) -> Self {
        let (changes, _rx) = watch::channel(0);
        Self {
            api,
            limiter: RateLimiter::new(config.sync_rate_limit()),
            retry: config.retry_policy(),
            permanent: config.permanent(),
            owner: OwnerPin::default(),
            autostart: Mutex::new(AutoStartMonitor::new(
                config.auto_start,
                config.auto_start_interval(),
            )),
            states: Mutex::new(HashMap::new()),
            changes,
            disposed: AtomicBool::new(false),
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<ResourceClass, ClassState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn autostart(&self) -> MutexGuard<'_, AutoStartMonitor> {
        self.autostart.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self) {
        self.changes.send_modify(|n| *n = n.wrapping_add(1));
    }

    pub fn api(&self) -> &QueueApi<T> {
        &self.api
    }

    pub fn limiter(&self) -> &RateLimiter<ResourceClass> {
        &self.limiter
    }

    /// Ticks once per state change (items, errors, loading).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Sync every class in `scope`. For `all`, the three classes run
    /// concurrently and settle independently.
    pub async fn sync(&self, scope: Scope, opts: SyncOptions) -> Vec<Item> {
        match scope {
            Scope::Class(class) => self.sync_class(class, opts).await.as_ref().clone(),
            Scope::All => {
                let (torrents, usenet, webdl) = tokio::join!(
                    self.sync_class(ResourceClass::Torrents, opts),
                    self.sync_class(ResourceClass::Usenet, opts),
                    self.sync_class(ResourceClass::WebDl, opts),
                );
                let mut out = Vec::with_capacity(torrents.len() + usenet.len() + webdl.len());
                for part in [torrents, usenet, webdl] {
                    out.extend(part.iter().cloned());
                }
                out
            }
        }
    }

    pub async fn sync_class(&self, class: ResourceClass, opts: SyncOptions) -> Arc<Vec<Item>> {
        if self.is_disposed() {
            return self.snapshot(class);
        }
        if !self.limiter.admit(&class) {
            tracing::debug!(class = %class, "sync refused by rate limiter");
            return self.snapshot(class);
        }

        let seq = self.begin(class, opts);
        let outcome = self.fetch_validated(class, opts.bypass_cache).await;
        let (items, committed) = self.commit(class, seq, opts, outcome);

        if committed && class == ResourceClass::Torrents {
            self.run_autostart(&items).await;
        }
        items
    }

    fn begin(&self, class: ResourceClass, opts: SyncOptions) -> u64 {
        let seq = {
            let mut states = self.states();
            let st = states.entry(class).or_default();
            st.latest_seq += 1;
            if !opts.skip_loading_flag {
                st.loading += 1;
            }
            st.latest_seq
        };
        self.notify();
        seq
    }

    async fn fetch_validated(
        &self,
        class: ResourceClass,
        bypass_cache: bool,
    ) -> Result<Fetched, SyncFailure> {
        match self.fetch_checked(class, bypass_cache).await {
            Err(failure) if failure.kind == ErrorClass::Validation => {
                tracing::warn!(class = %class, "{}; retrying once with cache bypass", failure.message);
                self.limiter.acquire(&class).await;
                self.fetch_checked(class, true).await.map_err(|f| {
                    if f.kind == ErrorClass::Validation {
                        SyncFailure {
                            kind: ErrorClass::Transient,
                            ..f
                        }
                    } else {
                        f
                    }
                })
            }
            other => other,
        }
    }

    async fn fetch_checked(
        &self,
        class: ResourceClass,
        bypass_cache: bool,
    ) -> Result<Fetched, SyncFailure> {
        let items = run_with_retry(&self.retry, &self.permanent, move |attempt| async move {
            if attempt > 1 {
                self.limiter.acquire(&class).await;
            }
            self.api.list(class, bypass_cache).await
        })
        .await
        .map_err(|f| SyncFailure::from_retry(class, &f))?;

        let owner = self.owner.check(&items).map_err(|message| SyncFailure {
            class,
            kind: ErrorClass::Validation,
            message,
        })?;
        Ok((items, owner))
    }

    /// Applies a finished fetch. Returns the list handed back to the caller
    /// and whether a fresh snapshot was committed.
    fn commit(
        &self,
        class: ResourceClass,
        seq: u64,
        opts: SyncOptions,
        outcome: Result<Fetched, SyncFailure>,
    ) -> (Arc<Vec<Item>>, bool) {
        let result = {
            let mut states = self.states();
            let st = states.entry(class).or_default();
            if !opts.skip_loading_flag {
                st.loading = st.loading.saturating_sub(1);
            }

            if seq != st.latest_seq {
                tracing::debug!(
                    class = %class,
                    seq,
                    latest = st.latest_seq,
                    "discarding stale sync response"
                );
                (Arc::clone(&st.items), false)
            } else {
                match outcome {
                    Ok((items, owner)) => {
                        self.owner.pin(owner);
                        st.items = Arc::new(items);
                        st.error = None;
                        (Arc::clone(&st.items), true)
                    }
                    Err(failure) if failure.kind == ErrorClass::RateLimited => {
                        // Upstream throttling: retried on the next tick, never surfaced.
                        tracing::debug!(class = %class, "sync throttled upstream: {}", failure.message);
                        (Arc::clone(&st.items), false)
                    }
                    Err(failure) => {
                        tracing::warn!(class = %class, kind = ?failure.kind, "sync failed: {}", failure.message);
                        st.error = Some(failure);
                        (Arc::new(Vec::new()), false)
                    }
                }
            }
        };
        self.notify();
        result
    }

    async fn run_autostart(&self, items: &[Item]) {
        let claimed = self.autostart().claim(items);
        let Some(id) = claimed else {
            return;
        };
        tracing::info!(item_id = id, "auto-starting queued torrent");
        if let Err(e) = self
            .api
            .control(ResourceClass::Torrents, id, ControlOp::ForceStart)
            .await
        {
            tracing::warn!(item_id = id, "auto-start failed: {e}");
        }
    }

    /// Item-level control operation. A successful delete removes the item
    /// from the local list right away.
    pub async fn control(
        &self,
        class: ResourceClass,
        item_id: u64,
        op: ControlOp,
    ) -> Result<(), RetryFailure> {
        run_with_retry(&self.retry, &self.permanent, move |_attempt| async move {
            self.api.control(class, item_id, op).await
        })
        .await?;
        if op == ControlOp::Delete {
            self.remove_item(class, item_id);
        }
        Ok(())
    }

    pub fn snapshot(&self, class: ResourceClass) -> Arc<Vec<Item>> {
        self.states()
            .get(&class)
            .map(|st| Arc::clone(&st.items))
            .unwrap_or_default()
    }

    /// Read-only projection; `all` concatenates the three classes.
    pub fn items(&self, scope: Scope) -> Vec<Item> {
        let states = self.states();
        scope
            .classes()
            .into_iter()
            .filter_map(|c| states.get(&c))
            .flat_map(|st| st.items.iter().cloned())
            .collect()
    }

    /// True while any non-background fetch in `scope` is in flight.
    pub fn loading(&self, scope: Scope) -> bool {
        let states = self.states();
        scope
            .classes()
            .into_iter()
            .any(|c| states.get(&c).is_some_and(|st| st.loading > 0))
    }

    pub fn error(&self, class: ResourceClass) -> Option<SyncFailure> {
        self.states().get(&class).and_then(|st| st.error.clone())
    }

    pub fn errors(&self, scope: Scope) -> Vec<SyncFailure> {
        let states = self.states();
        scope
            .classes()
            .into_iter()
            .filter_map(|c| states.get(&c).and_then(|st| st.error.clone()))
            .collect()
    }

    pub fn clear_error(&self, class: ResourceClass) {
        if let Some(st) = self.states().get_mut(&class) {
            st.error = None;
        }
        self.notify();
    }

    /// Replace a class's list from outside a fetch (e.g. optimistic updates).
    /// Any fetch already in flight for the class is superseded.
    pub fn set_items(&self, class: ResourceClass, items: Vec<Item>) {
        {
            let mut states = self.states();
            let st = states.entry(class).or_default();
            st.latest_seq += 1;
            st.items = Arc::new(items);
        }
        self.notify();
    }

    pub fn remove_item(&self, class: ResourceClass, item_id: u64) {
        let remaining: Vec<Item> = self
            .snapshot(class)
            .iter()
            .filter(|i| i.id != item_id)
            .cloned()
            .collect();
        self.set_items(class, remaining);
    }

    pub fn auto_start_policy(&self) -> AutoStartConfig {
        self.autostart().policy()
    }

    pub fn set_auto_start_policy(&self, policy: AutoStartConfig) {
        self.autostart().set_policy(policy);
    }

    pub fn pinned_owner(&self) -> Option<String> {
        self.owner.pinned()
    }

    /// Drop items, errors, rate-limit history, the owner pin and auto-start
    /// memory. Sequence numbers keep counting so late responses still lose.
    pub fn reset(&self) {
        {
            let mut states = self.states();
            for st in states.values_mut() {
                *st = ClassState {
                    latest_seq: st.latest_seq + 1,
                    ..ClassState::default()
                };
            }
        }
        self.limiter.reset();
        self.owner.clear();
        self.autostart().reset();
        self.notify();
    }

    /// Further syncs become no-ops returning the last snapshot.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<T: Transport> PollTarget for SyncEngine<T> {
    async fn poll(&self, class: ResourceClass) {
        self.sync_class(class, SyncOptions::background()).await;
    }

    /// Torrents keep polling in the background while auto-start has queued
    /// work to promote.
    fn fast_path(&self, class: ResourceClass) -> bool {
        class == ResourceClass::Torrents
            && self.autostart().is_enabled()
            && self.snapshot(class).iter().any(Item::is_queued)
    }
}
