//! Fan out link requests in fixed-size chunks.
//!
//! Every task of a chunk is spawned at once and the chunk is awaited as a
//! whole. If any task in a chunk fails after its retries, no further chunk is
//! dispatched; links already issued stay in the report and in the cache.
//!
//! Runs on one coordinator are serialized: a second run waits for the first
//! to finish, so progress always describes a single run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use super::guard::InFlightGuard;
use super::progress::BulkProgress;
use crate::api::{ApiError, Transport, TransportError};
use crate::history::HistoryRecord;
use crate::links::{DownloadTask, IssuedLink, LinkAcquirer};
use crate::retry::{ErrorKind, RetryFailure};

const HISTORY_REFRESH_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub task: DownloadTask,
    pub result: Result<IssuedLink, RetryFailure>,
}

/// Streamed while a bulk run is in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkEvent {
    Outcome(TaskOutcome),
    Progress(BulkProgress),
}

#[derive(Debug, Default)]
pub struct BulkReport {
    /// Issued links in task order.
    pub links: Vec<IssuedLink>,
    pub failures: Vec<(DownloadTask, RetryFailure)>,
    /// Tasks never dispatched because an earlier chunk failed.
    pub skipped: Vec<DownloadTask>,
    pub progress: BulkProgress,
    pub halted: bool,
    /// History as refreshed after the run.
    pub history: Vec<HistoryRecord>,
}

impl BulkReport {
    pub fn is_complete(&self) -> bool {
        !self.halted && self.failures.is_empty()
    }
}

pub struct BulkDownloadCoordinator<T> {
    acquirer: Arc<LinkAcquirer<T>>,
    concurrency: usize,
    progress: watch::Sender<BulkProgress>,
    /// Runs started and not yet finished or dropped, queued ones included.
    active: AtomicUsize,
    serial: Mutex<()>,
}

impl<T: Transport> BulkDownloadCoordinator<T> {
    pub fn new(acquirer: Arc<LinkAcquirer<T>>, concurrency: usize) -> Self {
        let (progress, _rx) = watch::channel(BulkProgress::default());
        Self {
            acquirer,
            concurrency: concurrency.max(1),
            progress,
            active: AtomicUsize::new(0),
            serial: Mutex::new(()),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn progress(&self) -> BulkProgress {
        *self.progress.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BulkProgress> {
        self.progress.subscribe()
    }

    /// True while any run is in progress or waiting for its turn.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    pub fn reset(&self) {
        self.progress.send_replace(BulkProgress::default());
    }

    fn publish(&self, progress: BulkProgress) {
        self.progress.send_replace(progress);
    }

    /// Runs `tasks` chunk by chunk. Per-task outcomes and progress after each
    /// chunk are sent to `events` when given; a closed receiver is ignored.
    pub async fn run(
        &self,
        tasks: Vec<DownloadTask>,
        events: Option<mpsc::Sender<BulkEvent>>,
    ) -> BulkReport {
        self.run_then(tasks, events, |_| {}).await
    }

    /// Like `run`, but calls `finish` with the report before the next queued
    /// run may start.
    pub async fn run_then<F>(
        &self,
        tasks: Vec<DownloadTask>,
        events: Option<mpsc::Sender<BulkEvent>>,
        finish: F,
    ) -> BulkReport
    where
        F: FnOnce(&BulkReport),
    {
        let _active = InFlightGuard::enter(&self.active);
        let _turn = self.serial.lock().await;
        let report = self.run_serial(tasks, events).await;
        finish(&report);
        report
    }

    async fn run_serial(
        &self,
        tasks: Vec<DownloadTask>,
        events: Option<mpsc::Sender<BulkEvent>>,
    ) -> BulkReport {
        let mut report = BulkReport {
            progress: BulkProgress::new(tasks.len()),
            ..BulkReport::default()
        };
        self.publish(report.progress);
        emit(&events, BulkEvent::Progress(report.progress)).await;

        let mut pending = tasks.into_iter();
        loop {
            let chunk: Vec<DownloadTask> = pending.by_ref().take(self.concurrency).collect();
            if chunk.is_empty() {
                break;
            }

            let handles: Vec<_> = chunk
                .into_iter()
                .map(|task| {
                    let acquirer = Arc::clone(&self.acquirer);
                    let spawned = task.clone();
                    let handle = tokio::spawn(async move {
                        acquirer.get_or_request_link(&spawned).await
                    });
                    (task, handle)
                })
                .collect();

            let mut chunk_failed = false;
            for (task, handle) in handles {
                let result = handle.await.unwrap_or_else(|e| {
                    Err(RetryFailure {
                        error: ApiError::Transport(TransportError::Other(format!(
                            "link task aborted: {e}"
                        ))),
                        kind: ErrorKind::Other,
                        attempts: 0,
                    })
                });
                match &result {
                    Ok(link) => {
                        report.progress.current += 1;
                        report.links.push(link.clone());
                    }
                    Err(failure) => {
                        chunk_failed = true;
                        tracing::warn!(
                            class = %task.class,
                            item_id = task.item_id,
                            file_id = ?task.file_id,
                            "bulk link failed: {failure}"
                        );
                        report.failures.push((task.clone(), failure.clone()));
                    }
                }
                emit(&events, BulkEvent::Outcome(TaskOutcome { task, result })).await;
            }

            self.publish(report.progress);
            emit(&events, BulkEvent::Progress(report.progress)).await;

            if chunk_failed {
                report.halted = true;
                report.skipped = pending.by_ref().collect();
                break;
            }
        }

        report.history = match self.acquirer.refresh_history(HISTORY_REFRESH_LIMIT).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("history refresh after bulk download failed: {e:#}");
                Vec::new()
            }
        };

        tracing::info!(
            succeeded = report.progress.current,
            total = report.progress.total,
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            "bulk download finished"
        );
        report
    }
}

async fn emit(events: &Option<mpsc::Sender<BulkEvent>>, event: BulkEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
