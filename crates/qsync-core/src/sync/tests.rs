//! Engine tests against a scripted transport. Time is paused so rate-limit
//! spacing and retry backoff run instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::api::{ControlOp, Credential, QueueApi};
use crate::config::{AutoStartConfig, QsyncConfig};
use crate::poll::PollTarget;
use crate::resource::{ResourceClass, Scope};
use crate::retry::ErrorClass;
use crate::sync::{SyncEngine, SyncOptions};
use crate::testing::{Reply, ScriptedTransport};

const SPACING: Duration = Duration::from_millis(2_001);

fn engine_with(transport: Arc<ScriptedTransport>, config: &QsyncConfig) -> Arc<SyncEngine<ScriptedTransport>> {
    let api = QueueApi::new(transport, "https://api.example/v1/api", Credential::new("key"));
    Arc::new(SyncEngine::new(api, config))
}

fn engine(transport: Arc<ScriptedTransport>) -> Arc<SyncEngine<ScriptedTransport>> {
    engine_with(transport, &QsyncConfig::default())
}

fn ids(items: &[crate::item::Item]) -> Vec<u64> {
    items.iter().map(|i| i.id).collect()
}

fn owned_items(ids: &[u64], owner: &str) -> Reply {
    let data: Vec<_> = ids
        .iter()
        .map(|id| json!({"id": id, "name": format!("n{id}"), "auth_id": owner}))
        .collect();
    Reply::json(200, &json!({"success": true, "data": data}).to_string())
}

/// Replies from `script` in order, repeating the last entry.
fn sequence(script: Vec<Reply>) -> ScriptedTransport {
    let n = AtomicUsize::new(0);
    ScriptedTransport::new(move |_| {
        let i = n.fetch_add(1, Ordering::SeqCst).min(script.len() - 1);
        script[i].clone()
    })
}

#[tokio::test(start_paused = true)]
async fn refused_admission_returns_previous_snapshot_without_fetch() {
    let transport = Arc::new(ScriptedTransport::new(|_| Reply::items(&[1, 2])));
    let engine = engine(Arc::clone(&transport));
    let class = Scope::Class(ResourceClass::Torrents);

    assert_eq!(ids(&engine.sync(class, SyncOptions::default()).await), vec![1, 2]);
    let again = engine.sync(class, SyncOptions::default()).await;
    assert_eq!(ids(&again), vec![1, 2]);
    assert_eq!(transport.call_count(), 1);
    assert!(engine.error(ResourceClass::Torrents).is_none());
}

#[tokio::test(start_paused = true)]
async fn stale_response_never_overwrites_newer_state() {
    let n = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&n);
    let transport = Arc::new(ScriptedTransport::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Reply::items(&[1]).after(Duration::from_secs(5))
        } else {
            Reply::items(&[2])
        }
    }));
    let engine = engine(transport);

    let slow = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .sync_class(ResourceClass::Usenet, SyncOptions::default())
                .await
        })
    };
    tokio::time::sleep(SPACING).await;
    let fresh = engine
        .sync_class(ResourceClass::Usenet, SyncOptions::default())
        .await;
    assert_eq!(ids(&fresh), vec![2]);

    let late = slow.await.unwrap();
    assert_eq!(ids(&late), vec![2]);
    assert_eq!(ids(&engine.items(Scope::Class(ResourceClass::Usenet))), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn failure_keeps_stale_items_and_reports_error() {
    let transport = Arc::new(sequence(vec![
        Reply::items(&[1]),
        Reply::json(503, ""),
    ]));
    let engine = engine(Arc::clone(&transport));
    let class = ResourceClass::WebDl;

    engine.sync_class(class, SyncOptions::default()).await;
    tokio::time::sleep(SPACING).await;
    let result = engine.sync_class(class, SyncOptions::default()).await;

    assert!(result.is_empty());
    assert_eq!(ids(&engine.snapshot(class)), vec![1]);
    let err = engine.error(class).unwrap();
    assert_eq!(err.kind, ErrorClass::Transient);
    assert_eq!(transport.call_count(), 4);
    assert!(!engine.loading(Scope::All));
}

#[tokio::test(start_paused = true)]
async fn upstream_throttling_is_not_reported() {
    let transport = Arc::new(sequence(vec![
        Reply::items(&[1]),
        Reply::json(429, r#"{"success":false,"error":"TOO_MANY_REQUESTS"}"#),
    ]));
    let engine = engine(Arc::clone(&transport));
    let class = ResourceClass::Torrents;

    engine.sync_class(class, SyncOptions::default()).await;
    tokio::time::sleep(SPACING).await;
    let result = engine.sync_class(class, SyncOptions::default()).await;

    assert_eq!(ids(&result), vec![1]);
    assert!(engine.error(class).is_none());
    assert!(engine.errors(Scope::All).is_empty());
    assert_eq!(transport.call_count(), 4);
    assert!(!engine.loading(Scope::All));
}

#[tokio::test(start_paused = true)]
async fn auth_failure_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        Reply::json(401, r#"{"success":false,"error":"AUTH_ERROR"}"#)
    }));
    let engine = engine(Arc::clone(&transport));
    engine
        .sync_class(ResourceClass::Torrents, SyncOptions::default())
        .await;
    assert_eq!(
        engine.error(ResourceClass::Torrents).unwrap().kind,
        ErrorClass::Auth
    );
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn success_clears_previous_error() {
    let transport = Arc::new(sequence(vec![
        Reply::json(404, r#"{"success":false,"error":"ITEM_NOT_FOUND"}"#),
        Reply::items(&[3]),
    ]));
    let engine = engine(transport);
    engine
        .sync_class(ResourceClass::Torrents, SyncOptions::default())
        .await;
    assert_eq!(
        engine.error(ResourceClass::Torrents).unwrap().kind,
        ErrorClass::Permanent
    );
    tokio::time::sleep(SPACING).await;
    engine
        .sync_class(ResourceClass::Torrents, SyncOptions::default())
        .await;
    assert!(engine.error(ResourceClass::Torrents).is_none());
}

#[tokio::test(start_paused = true)]
async fn ownership_mismatch_retries_once_with_bypass() {
    let transport = Arc::new(sequence(vec![
        owned_items(&[1], "acct-1"),
        owned_items(&[9], "acct-2"),
        owned_items(&[2], "acct-1"),
    ]));
    let engine = engine(Arc::clone(&transport));
    let class = ResourceClass::Torrents;

    engine.sync_class(class, SyncOptions::default()).await;
    assert_eq!(engine.pinned_owner().as_deref(), Some("acct-1"));

    tokio::time::sleep(SPACING).await;
    let items = engine.sync_class(class, SyncOptions::default()).await;
    assert_eq!(ids(&items), vec![2]);

    let calls = transport.calls_to("mylist");
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].query_param("bypass_cache"), None);
    assert_eq!(calls[2].query_param("bypass_cache").as_deref(), Some("true"));
}

#[tokio::test(start_paused = true)]
async fn repeated_ownership_mismatch_surfaces_as_transient() {
    let transport = Arc::new(sequence(vec![
        owned_items(&[1], "acct-1"),
        owned_items(&[9], "acct-2"),
    ]));
    let engine = engine(Arc::clone(&transport));
    let class = ResourceClass::Torrents;

    engine.sync_class(class, SyncOptions::default()).await;
    tokio::time::sleep(SPACING).await;
    let items = engine.sync_class(class, SyncOptions::default()).await;

    assert!(items.is_empty());
    assert_eq!(ids(&engine.snapshot(class)), vec![1]);
    assert_eq!(engine.error(class).unwrap().kind, ErrorClass::Transient);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn all_settles_each_class_independently() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        let path = req.path();
        if path.contains("/usenet/") {
            Reply::json(404, r#"{"success":false,"detail":"not found"}"#)
                .after(Duration::from_secs(1))
        } else if path.contains("/torrents/") {
            Reply::items(&[1, 2]).after(Duration::from_secs(3))
        } else {
            Reply::items(&[7])
        }
    }));
    let engine = engine(transport);

    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.sync(Scope::All, SyncOptions::default()).await })
    };
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(engine.loading(Scope::All));
    assert!(engine.loading(Scope::Class(ResourceClass::Torrents)));
    assert!(!engine.loading(Scope::Class(ResourceClass::WebDl)));

    let items = task.await.unwrap();
    let mut got = ids(&items);
    got.sort();
    assert_eq!(got, vec![1, 2, 7]);
    assert!(!engine.loading(Scope::All));
    assert_eq!(engine.errors(Scope::All).len(), 1);
    assert_eq!(
        engine.error(ResourceClass::Usenet).unwrap().kind,
        ErrorClass::Permanent
    );
}

#[tokio::test(start_paused = true)]
async fn background_ticks_leave_loading_flag_alone() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        Reply::items(&[1]).after(Duration::from_secs(1))
    }));
    let engine = engine(transport);
    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.poll(ResourceClass::Torrents).await })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!engine.loading(Scope::All));
    task.await.unwrap();
    assert_eq!(ids(&engine.snapshot(ResourceClass::Torrents)), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn set_items_supersedes_in_flight_fetch() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        Reply::items(&[1, 2]).after(Duration::from_secs(1))
    }));
    let engine = engine(transport);
    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .sync_class(ResourceClass::Torrents, SyncOptions::default())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.set_items(ResourceClass::Torrents, vec![crate::item::Item::new(5, "local")]);
    task.await.unwrap();
    assert_eq!(ids(&engine.snapshot(ResourceClass::Torrents)), vec![5]);
}

#[tokio::test(start_paused = true)]
async fn auto_start_promotes_one_queued_torrent() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.path().ends_with("controltorrent") {
            return Reply::json(200, r#"{"success":true}"#);
        }
        Reply::json(
            200,
            &json!({"success": true, "data": [
                {"id": 1, "name": "a", "active": true},
                {"id": 2, "name": "b", "download_state": "queued"},
                {"id": 3, "name": "c", "download_state": "queued"},
            ]})
            .to_string(),
        )
    }));
    let config = QsyncConfig {
        auto_start: AutoStartConfig {
            enabled: true,
            concurrency_limit: 3,
        },
        ..QsyncConfig::default()
    };
    let engine = engine_with(Arc::clone(&transport), &config);

    engine
        .sync_class(ResourceClass::Torrents, SyncOptions::default())
        .await;
    let controls = transport.calls_to("controltorrent");
    assert_eq!(controls.len(), 1);
    let body = controls[0].json_body.clone().unwrap();
    assert_eq!(body["torrent_id"], 2);
    assert_eq!(body["operation"], "force_start");
    assert!(engine.fast_path(ResourceClass::Torrents));
    assert!(!engine.fast_path(ResourceClass::Usenet));

    // Throttled: a sync inside the 30s interval does not check again.
    tokio::time::sleep(SPACING).await;
    engine
        .sync_class(ResourceClass::Torrents, SyncOptions::default())
        .await;
    assert_eq!(transport.calls_to("controltorrent").len(), 1);

    // After the interval the next queued item goes; item 2 is never retried.
    tokio::time::sleep(Duration::from_secs(30)).await;
    engine
        .sync_class(ResourceClass::Torrents, SyncOptions::default())
        .await;
    let controls = transport.calls_to("controltorrent");
    assert_eq!(controls.len(), 2);
    assert_eq!(controls[1].json_body.as_ref().unwrap()["torrent_id"], 3);
}

#[tokio::test(start_paused = true)]
async fn delete_removes_item_optimistically() {
    let transport = Arc::new(ScriptedTransport::new(|req| {
        if req.path().ends_with("controlwebdownload") {
            Reply::json(200, r#"{"success":true}"#)
        } else {
            Reply::items(&[1, 2, 3])
        }
    }));
    let engine = engine(transport);
    engine
        .sync_class(ResourceClass::WebDl, SyncOptions::default())
        .await;
    engine
        .control(ResourceClass::WebDl, 2, ControlOp::Delete)
        .await
        .unwrap();
    assert_eq!(ids(&engine.snapshot(ResourceClass::WebDl)), vec![1, 3]);

    engine
        .control(ResourceClass::WebDl, 1, ControlOp::Pause)
        .await
        .unwrap();
    assert_eq!(ids(&engine.snapshot(ResourceClass::WebDl)), vec![1, 3]);
}

#[tokio::test(start_paused = true)]
async fn reset_and_dispose() {
    let transport = Arc::new(ScriptedTransport::new(|_| owned_items(&[1], "acct-1")));
    let engine = engine(Arc::clone(&transport));
    engine
        .sync_class(ResourceClass::Torrents, SyncOptions::default())
        .await;
    assert_eq!(engine.limiter().calls_in_window(&ResourceClass::Torrents), 1);

    engine.reset();
    assert!(engine.items(Scope::All).is_empty());
    assert!(engine.pinned_owner().is_none());
    assert_eq!(engine.limiter().calls_in_window(&ResourceClass::Torrents), 0);

    // Admitted immediately: no rate-limit history survives the reset.
    engine
        .sync_class(ResourceClass::Torrents, SyncOptions::default())
        .await;
    assert_eq!(transport.call_count(), 2);

    engine.dispose();
    tokio::time::sleep(Duration::from_secs(60)).await;
    engine
        .sync_class(ResourceClass::Torrents, SyncOptions::default())
        .await;
    assert_eq!(transport.call_count(), 2);
}
