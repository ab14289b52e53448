//! Control socket: server (during `qsync watch`) and client (for `qsync pause` etc.).
//! Protocol: one `ControlCommand` line per message.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use qsync_core::api::Transport;
use qsync_core::control::ControlCommand;
use qsync_core::session::Session;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

/// Binds `path` and applies each well-formed line to `session`. Malformed
/// lines are logged and skipped.
pub fn spawn_control_listener<T: Transport>(
    session: Arc<Session<T>>,
    path: impl AsRef<Path>,
) -> Result<JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    tracing::debug!(path = %path.display(), "control socket listening");

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let session = Arc::clone(&session);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            match ControlCommand::parse(&line) {
                                Some(cmd) => {
                                    tracing::info!(command = %cmd, "control command");
                                    session.apply(cmd).await;
                                }
                                None if line.trim().is_empty() => {}
                                None => tracing::debug!(line = %line.trim(), "ignored control line"),
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends one command line. Returns `false` when no watcher is listening.
pub async fn send_line(socket_path: &Path, command: &ControlCommand) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    stream.write_all(command.to_line().as_bytes()).await?;
    stream.shutdown().await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn send_line_without_listener_reports_false() {
        let dir = tempdir().unwrap();
        let sent = send_line(&dir.path().join("none.sock"), &ControlCommand::Refresh)
            .await
            .unwrap();
        assert!(!sent);
    }

    #[tokio::test]
    async fn send_line_delivers_one_protocol_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ctl.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let reader = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            lines.next_line().await.unwrap()
        });

        let cmd = ControlCommand::Pause("modal".into());
        assert!(send_line(&path, &cmd).await.unwrap());
        let line = reader.await.unwrap().unwrap();
        assert_eq!(ControlCommand::parse(&line), Some(cmd));
    }
}
