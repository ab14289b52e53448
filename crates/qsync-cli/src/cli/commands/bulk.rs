//! `qsync bulk` – links for many items, streamed as they arrive.

use anyhow::{bail, Result};
use qsync_core::api::Transport;
use qsync_core::bulk::BulkEvent;
use qsync_core::links::DownloadTask;
use qsync_core::resource::ResourceClass;
use qsync_core::session::Session;
use qsync_core::sync::SyncOptions;
use tokio::sync::mpsc;

pub async fn run_bulk<T: Transport>(
    session: &Session<T>,
    class: ResourceClass,
    ids: Vec<u64>,
    per_file: bool,
) -> Result<()> {
    let items = session.fetch_items(class.into(), SyncOptions::default()).await;
    if let Some(failure) = session.error(class) {
        bail!("could not list {class}: {}", failure.message);
    }
    let selected: Vec<_> = if ids.is_empty() {
        items
    } else {
        items.into_iter().filter(|i| ids.contains(&i.id)).collect()
    };
    for missing in ids.iter().filter(|id| !selected.iter().any(|i| i.id == **id)) {
        eprintln!("{class} {missing}: not in queue, skipped");
    }
    let tasks = DownloadTask::for_items(class, &selected, per_file);
    if tasks.is_empty() {
        println!("Nothing to download.");
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(32);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                BulkEvent::Progress(p) => {
                    eprintln!("  {}/{} ({:.0}%)", p.current, p.total, p.fraction() * 100.0)
                }
                BulkEvent::Outcome(outcome) => match outcome.result {
                    Ok(link) => println!("{}", link.url),
                    Err(failure) => eprintln!(
                        "{} {}{}: {failure}",
                        outcome.task.class,
                        outcome.task.item_id,
                        outcome
                            .task
                            .file_id
                            .map(|f| format!("/{f}"))
                            .unwrap_or_default()
                    ),
                },
            }
        }
    });

    let report = session.handle_bulk_download(tasks, Some(tx)).await;
    let _ = printer.await;

    if !report.is_complete() {
        bail!(
            "{} link(s) failed, {} not attempted",
            report.failures.len(),
            report.skipped.len()
        );
    }
    tracing::info!(links = report.links.len(), "bulk download complete");
    Ok(())
}
