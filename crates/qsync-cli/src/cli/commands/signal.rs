//! `qsync pause|unpause|visible|hidden|refresh` – steer a running watcher.

use anyhow::Result;
use qsync_core::control::{default_control_socket_path, ControlCommand};

use crate::cli::control_socket;

pub async fn run_signal(command: ControlCommand) -> Result<()> {
    let path = default_control_socket_path()?;
    if control_socket::send_line(&path, &command).await? {
        println!("sent: {command}");
    } else {
        println!("No running `qsync watch`.");
    }
    Ok(())
}
