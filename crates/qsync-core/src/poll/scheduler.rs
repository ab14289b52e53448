//! One timer loop per resource class.
//!
//! Each loop recomputes its cadence whenever the pause set, visibility, or an
//! explicit re-arm request changes, so there is never more than one pending
//! timer per class. Respawning a class aborts the previous loop first.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::cadence::{cadence, PollConfig};
use super::pause::PauseReasons;
use super::visibility::Visibility;
use crate::resource::{ResourceClass, Scope};

/// What the scheduler drives.
pub trait PollTarget: Send + Sync + 'static {
    /// One background sync tick for `class`. Must not fail.
    fn poll(&self, class: ResourceClass) -> impl Future<Output = ()> + Send;

    /// Class-specific condition that keeps short-interval polling alive while
    /// hidden.
    fn fast_path(&self, class: ResourceClass) -> bool;
}

pub struct PollingScheduler<P> {
    target: Arc<P>,
    config: PollConfig,
    pause: PauseReasons,
    visibility: Visibility,
    rearm: watch::Sender<u64>,
    tasks: Mutex<HashMap<ResourceClass, JoinHandle<()>>>,
}

impl<P: PollTarget> PollingScheduler<P> {
    pub fn new(
        target: Arc<P>,
        config: PollConfig,
        pause: PauseReasons,
        visibility: Visibility,
    ) -> Self {
        let (rearm, _rx) = watch::channel(0);
        Self {
            target,
            config,
            pause,
            visibility,
            rearm,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Poll exactly the classes in `scope`; loops for other classes stop.
    pub fn set_scope(&self, scope: Scope) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
        for class in scope.classes() {
            let handle = tokio::spawn(run_class(
                Arc::clone(&self.target),
                class,
                self.config,
                self.pause.clone(),
                self.visibility.clone(),
                self.rearm.subscribe(),
            ));
            tasks.insert(class, handle);
        }
        tracing::debug!(scope = %scope, "polling scope armed");
    }

    /// Ask every loop to re-evaluate its cadence (e.g. after the fast-path
    /// condition may have changed).
    pub fn rearm(&self) {
        self.rearm.send_modify(|n| *n = n.wrapping_add(1));
    }

    pub fn stop_all(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }

    /// Classes that currently have a running loop.
    pub fn active_classes(&self) -> Vec<ResourceClass> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let mut classes: Vec<_> = tasks
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(c, _)| *c)
            .collect();
        classes.sort();
        classes
    }
}

impl<P> Drop for PollingScheduler<P> {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

async fn run_class<P: PollTarget>(
    target: Arc<P>,
    class: ResourceClass,
    config: PollConfig,
    pause: PauseReasons,
    visibility: Visibility,
    mut rearm: watch::Receiver<u64>,
) {
    let mut pause_rx = pause.subscribe();
    let mut vis_rx = visibility.subscribe();
    let mut was_visible = vis_rx.borrow_and_update().visible;
    pause_rx.borrow_and_update();
    rearm.borrow_and_update();

    loop {
        let paused = !pause_rx.borrow().is_empty();
        let visible = vis_rx.borrow().visible;
        let mode = cadence(paused, visible, target.fast_path(class), &config);
        tracing::trace!(class = %class, ?mode, "poll cadence");

        let tick = async {
            match mode.interval() {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tick => {
                target.poll(class).await;
            }
            changed = pause_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            changed = vis_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let state = *vis_rx.borrow_and_update();
                let returned = state.visible && !was_visible;
                was_visible = state.visible;
                let long_hidden = state
                    .last_hidden_for
                    .is_some_and(|h| h > config.hidden_resync_threshold);
                if returned && long_hidden && !pause.is_paused() {
                    tracing::debug!(class = %class, "visible after long hide, resyncing");
                    target.poll(class).await;
                }
            }
            changed = rearm.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}
