//! Out-of-band signals for a running `qsync watch`.
//!
//! A watcher listens on a Unix socket; other `qsync` invocations send one line
//! per command. This module owns the line protocol and the socket location;
//! the listener itself lives in the CLI.

use std::fmt;
use std::path::PathBuf;

/// One line on the control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Assert a named pause reason.
    Pause(String),
    /// Retract a named pause reason.
    Unpause(String),
    Visible,
    Hidden,
    /// Ask for an immediate sync of the watched scope.
    Refresh,
}

impl ControlCommand {
    /// Parses a single protocol line. Returns `None` for blank or malformed lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((v, r)) => (v, r.trim()),
            None => (line, ""),
        };
        match (verb, rest) {
            ("pause", reason) if !reason.is_empty() => Some(Self::Pause(reason.to_string())),
            ("unpause", reason) if !reason.is_empty() => Some(Self::Unpause(reason.to_string())),
            ("visible", "") => Some(Self::Visible),
            ("hidden", "") => Some(Self::Hidden),
            ("refresh", "") => Some(Self::Refresh),
            _ => None,
        }
    }

    /// The line to write on the socket, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause(r) => write!(f, "pause {r}"),
            Self::Unpause(r) => write!(f, "unpause {r}"),
            Self::Visible => f.write_str("visible"),
            Self::Hidden => f.write_str("hidden"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// Default path for the control socket (same XDG state dir as the history DB).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("qsync")?
        .get_state_home()
        .join("qsync");
    Ok(dir.join("control.sock"))
}
