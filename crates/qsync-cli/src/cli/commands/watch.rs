//! `qsync watch` – sync, then poll until Ctrl-C. Other invocations steer it
//! through the control socket.

use std::sync::Arc;

use anyhow::Result;
use qsync_core::api::CurlTransport;
use qsync_core::control::default_control_socket_path;
use qsync_core::resource::Scope;
use qsync_core::session::Session;
use qsync_core::sync::SyncOptions;

use super::print_items;
use crate::cli::control_socket;

pub async fn run_watch(session: Arc<Session<CurlTransport>>, scope: Scope) -> Result<()> {
    let mut changes = session.engine().subscribe();

    // The scheduler waits one interval before its first poll.
    session.fetch_items(scope, SyncOptions::default()).await;
    changes.borrow_and_update();
    print_items(&session, scope);

    session.start_polling(scope);

    let socket_path = default_control_socket_path().ok();
    let listener = socket_path.as_ref().and_then(|path| {
        control_socket::spawn_control_listener(Arc::clone(&session), path)
            .map_err(|e| tracing::warn!(path = %path.display(), "control socket bind: {e:#}"))
            .ok()
    });

    tracing::info!(%scope, "watching");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                println!();
                print_items(&session, scope);
            }
        }
    }

    if let Some(handle) = listener {
        handle.abort();
    }
    if let Some(path) = socket_path {
        let _ = std::fs::remove_file(path);
    }
    session.dispose();
    tracing::info!("watch stopped");
    Ok(())
}
