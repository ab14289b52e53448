//! `qsync link` – print a download link for one item or file.

use anyhow::Result;
use qsync_core::api::Transport;
use qsync_core::links::DownloadTask;
use qsync_core::resource::ResourceClass;
use qsync_core::session::Session;

pub async fn run_link<T: Transport>(
    session: &Session<T>,
    class: ResourceClass,
    id: u64,
    file: Option<u64>,
    name: Option<String>,
) -> Result<()> {
    let task = match file {
        Some(file_id) => DownloadTask::file(class, id, file_id, name),
        None => DownloadTask::item(class, id, name),
    };
    let link = session.download_single(&task).await?;
    tracing::debug!(source = ?link.source, "link issued");
    println!("{}", link.url);
    Ok(())
}
