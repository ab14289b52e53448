//! One credential's worth of sync and download state.
//!
//! Everything stateful (engine, link cache, limiters, scheduler, bulk
//! progress) lives in a parts bundle that is rebuilt from scratch when the
//! credential changes. Pause reasons and visibility belong to the host and
//! survive the switch.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::mpsc;

use crate::api::{ControlOp, Credential, QueueApi, Transport};
use crate::bulk::guard::InFlightGuard;
use crate::bulk::{BulkDownloadCoordinator, BulkEvent, BulkProgress, BulkReport};
use crate::config::QsyncConfig;
use crate::control::ControlCommand;
use crate::history::{HistoryRecord, HistoryStore};
use crate::item::Item;
use crate::links::{DownloadTask, IssuedLink, LinkAcquirer};
use crate::poll::{PauseReasons, PollingScheduler, Visibility};
use crate::resource::{ResourceClass, Scope};
use crate::retry::RetryFailure;
use crate::sync::{SyncEngine, SyncFailure, SyncOptions};

struct SessionParts<T> {
    credential: Credential,
    engine: Arc<SyncEngine<T>>,
    acquirer: Arc<LinkAcquirer<T>>,
    bulk: BulkDownloadCoordinator<T>,
    scheduler: PollingScheduler<SyncEngine<T>>,
    download_links: Mutex<Vec<IssuedLink>>,
    single_in_flight: AtomicUsize,
}

impl<T: Transport> SessionParts<T> {
    fn build(
        credential: Credential,
        config: &QsyncConfig,
        transport: &Arc<T>,
        history: Option<HistoryStore>,
        pause: &PauseReasons,
        visibility: &Visibility,
    ) -> Self {
        let api = QueueApi::new(Arc::clone(transport), config.api_base.clone(), credential.clone());
        let engine = Arc::new(SyncEngine::new(api.clone(), config));
        let acquirer = Arc::new(LinkAcquirer::new(api, config, history));
        let bulk = BulkDownloadCoordinator::new(Arc::clone(&acquirer), config.bulk_concurrency());
        let scheduler = PollingScheduler::new(
            Arc::clone(&engine),
            config.poll_config(),
            pause.clone(),
            visibility.clone(),
        );
        Self {
            credential,
            engine,
            acquirer,
            bulk,
            scheduler,
            download_links: Mutex::new(Vec::new()),
            single_in_flight: AtomicUsize::new(0),
        }
    }

    fn links(&self) -> MutexGuard<'_, Vec<IssuedLink>> {
        self.download_links.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stop timers and drop every cache and counter.
    fn teardown(&self) {
        self.scheduler.stop_all();
        self.engine.dispose();
        self.engine.reset();
        self.acquirer.reset();
        self.bulk.reset();
        self.links().clear();
    }
}

pub struct Session<T> {
    config: QsyncConfig,
    transport: Arc<T>,
    history: Option<HistoryStore>,
    pause: PauseReasons,
    visibility: Visibility,
    parts: RwLock<Arc<SessionParts<T>>>,
    scope: Mutex<Option<Scope>>,
    disposed: AtomicBool,
}

impl<T: Transport> Session<T> {
    pub fn create(
        credential: Credential,
        config: QsyncConfig,
        transport: Arc<T>,
        history: Option<HistoryStore>,
    ) -> Self {
        let pause = PauseReasons::new();
        let visibility = Visibility::new(true);
        let parts = SessionParts::build(
            credential,
            &config,
            &transport,
            history.clone(),
            &pause,
            &visibility,
        );
        tracing::info!(
            credential = %short_fingerprint(parts.acquirer.fingerprint()),
            "session created"
        );
        Self {
            config,
            transport,
            history,
            pause,
            visibility,
            parts: RwLock::new(Arc::new(parts)),
            scope: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    fn parts(&self) -> Arc<SessionParts<T>> {
        Arc::clone(&self.parts.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn scope_slot(&self) -> MutexGuard<'_, Option<Scope>> {
        self.scope.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &QsyncConfig {
        &self.config
    }

    pub fn credential(&self) -> Credential {
        self.parts().credential.clone()
    }

    pub fn pause_reasons(&self) -> &PauseReasons {
        &self.pause
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub fn engine(&self) -> Arc<SyncEngine<T>> {
        Arc::clone(&self.parts().engine)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Arm background polling for `scope`, replacing any previous scope.
    pub fn start_polling(&self, scope: Scope) {
        if self.is_disposed() {
            return;
        }
        *self.scope_slot() = Some(scope);
        self.parts().scheduler.set_scope(scope);
    }

    pub fn stop_polling(&self) {
        *self.scope_slot() = None;
        self.parts().scheduler.stop_all();
    }

    pub fn polling_scope(&self) -> Option<Scope> {
        *self.scope_slot()
    }

    /// Swap the API key. Every per-credential entity is torn down and rebuilt;
    /// polling resumes on the same scope.
    pub fn switch_credential(&self, credential: Credential) {
        if self.is_disposed() {
            return;
        }
        let fresh = Arc::new(SessionParts::build(
            credential,
            &self.config,
            &self.transport,
            self.history.clone(),
            &self.pause,
            &self.visibility,
        ));
        let old = {
            let mut slot = self.parts.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *slot, Arc::clone(&fresh))
        };
        old.teardown();
        tracing::info!(
            credential = %short_fingerprint(fresh.acquirer.fingerprint()),
            "credential switched, session state reset"
        );
        if let Some(scope) = *self.scope_slot() {
            fresh.scheduler.set_scope(scope);
        }
    }

    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let parts = self.parts();
        parts.scheduler.stop_all();
        parts.engine.dispose();
        tracing::info!("session disposed");
    }

    pub fn loading(&self, scope: Scope) -> bool {
        self.parts().engine.loading(scope)
    }

    pub fn error(&self, class: ResourceClass) -> Option<SyncFailure> {
        self.parts().engine.error(class)
    }

    pub fn errors(&self, scope: Scope) -> Vec<SyncFailure> {
        self.parts().engine.errors(scope)
    }

    pub fn items(&self, scope: Scope) -> Vec<Item> {
        self.parts().engine.items(scope)
    }

    pub fn set_items(&self, class: ResourceClass, items: Vec<Item>) {
        self.parts().engine.set_items(class, items);
    }

    /// Foreground sync; the fast-path condition may change, so timers re-arm.
    pub async fn fetch_items(&self, scope: Scope, opts: SyncOptions) -> Vec<Item> {
        let parts = self.parts();
        let items = parts.engine.sync(scope, opts).await;
        parts.scheduler.rearm();
        items
    }

    pub async fn control(
        &self,
        class: ResourceClass,
        item_id: u64,
        op: ControlOp,
    ) -> Result<(), RetryFailure> {
        self.parts().engine.control(class, item_id, op).await
    }

    pub fn download_links(&self) -> Vec<IssuedLink> {
        self.parts().links().clone()
    }

    pub fn is_downloading(&self) -> bool {
        let parts = self.parts();
        parts.bulk.is_running() || parts.single_in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn download_progress(&self) -> BulkProgress {
        self.parts().bulk.progress()
    }

    pub async fn download_single(&self, task: &DownloadTask) -> Result<IssuedLink, RetryFailure> {
        let parts = self.parts();
        let result = {
            let _in_flight = InFlightGuard::enter(&parts.single_in_flight);
            parts.acquirer.get_or_request_link(task).await
        };
        if let Ok(link) = &result {
            parts.links().push(link.clone());
        }
        result
    }

    /// Runs a bulk acquisition; the resulting links replace `download_links`.
    /// Overlapping calls run one after another, each replacing the list when
    /// its own run finishes.
    pub async fn handle_bulk_download(
        &self,
        tasks: Vec<DownloadTask>,
        events: Option<mpsc::Sender<BulkEvent>>,
    ) -> BulkReport {
        let parts = self.parts();
        parts
            .bulk
            .run_then(tasks, events, |report| {
                *parts.links() = report.links.clone();
            })
            .await
    }

    pub async fn history(&self, limit: u32) -> anyhow::Result<Vec<HistoryRecord>> {
        self.parts().acquirer.refresh_history(limit).await
    }

    /// Apply one control-socket command.
    pub async fn apply(&self, command: ControlCommand) {
        match command {
            ControlCommand::Pause(reason) => {
                self.pause.assert_pause(reason);
            }
            ControlCommand::Unpause(reason) => {
                self.pause.retract_pause(&reason);
            }
            ControlCommand::Visible => {
                self.visibility.set_visible(true);
            }
            ControlCommand::Hidden => {
                self.visibility.set_visible(false);
            }
            ControlCommand::Refresh => {
                let scope = self.polling_scope().unwrap_or(Scope::All);
                self.fetch_items(scope, SyncOptions::default()).await;
            }
        }
    }
}

fn short_fingerprint(fp: &str) -> &str {
    fp.get(..8).unwrap_or(fp)
}
