//! CLI for the qsync queue synchronizer.

mod commands;
mod control_socket;

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use qsync_core::api::{ControlOp, Credential, CurlTransport};
use qsync_core::config::{self, QsyncConfig};
use qsync_core::control::ControlCommand;
use qsync_core::history::HistoryStore;
use qsync_core::resource::{ResourceClass, Scope};
use qsync_core::session::Session;

use commands::{
    run_bulk, run_completions, run_control, run_history, run_link, run_list, run_signal,
    run_watch,
};

/// Top-level CLI for qsync.
#[derive(Debug, Parser)]
#[command(name = "qsync")]
#[command(about = "qsync: rate-limited sync client for a remote download queue", long_about = None)]
pub struct Cli {
    /// API key; overrides `api_key` in the config file.
    #[arg(long, global = true, env = "QSYNC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Sync once, then keep polling and print changes until Ctrl-C.
    Watch {
        /// torrents, usenet, webdl or all.
        #[arg(default_value = "all")]
        scope: Scope,
    },

    /// Sync once and print the queue.
    List {
        #[arg(default_value = "all")]
        scope: Scope,
        /// Ask upstream to skip its own cache.
        #[arg(long)]
        fresh: bool,
    },

    /// Get a download link for one item or file.
    Link {
        class: ResourceClass,
        id: u64,
        /// Link a single file of the item instead of the whole item.
        #[arg(long, value_name = "FILE_ID")]
        file: Option<u64>,
        /// Download filename hint appended to the link.
        #[arg(long)]
        name: Option<String>,
    },

    /// Get links for many items, a few at a time. Stops after the first failing batch.
    Bulk {
        class: ResourceClass,
        /// Item ids; every item of the class when omitted.
        ids: Vec<u64>,
        /// One link per file instead of per item.
        #[arg(long)]
        per_file: bool,
    },

    /// Run a control operation (pause, resume, delete, reannounce, stop-seeding, force-start).
    Control {
        class: ResourceClass,
        id: u64,
        op: ControlOp,
    },

    /// Show recently issued links for the current API key.
    History {
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Pause polling in a running `qsync watch` under a named reason.
    Pause {
        #[arg(default_value = "manual")]
        reason: String,
    },

    /// Retract a pause reason in a running `qsync watch`.
    Unpause {
        #[arg(default_value = "manual")]
        reason: String,
    },

    /// Tell a running `qsync watch` it is in the foreground.
    Visible,

    /// Tell a running `qsync watch` it is in the background.
    Hidden,

    /// Ask a running `qsync watch` to sync now.
    Refresh,

    /// Print shell completions to stdout.
    Completions { shell: Shell },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let api_key = cli.api_key;

        match cli.command {
            CliCommand::Watch { scope } => {
                let session = open_session(api_key, cfg).await?;
                run_watch(Arc::new(session), scope).await?;
            }
            CliCommand::List { scope, fresh } => {
                run_list(&open_session(api_key, cfg).await?, scope, fresh).await?
            }
            CliCommand::Link {
                class,
                id,
                file,
                name,
            } => run_link(&open_session(api_key, cfg).await?, class, id, file, name).await?,
            CliCommand::Bulk {
                class,
                ids,
                per_file,
            } => run_bulk(&open_session(api_key, cfg).await?, class, ids, per_file).await?,
            CliCommand::Control { class, id, op } => {
                run_control(&open_session(api_key, cfg).await?, class, id, op).await?
            }
            CliCommand::History { limit } => {
                run_history(&open_session(api_key, cfg).await?, limit).await?
            }
            CliCommand::Pause { reason } => run_signal(ControlCommand::Pause(reason)).await?,
            CliCommand::Unpause { reason } => run_signal(ControlCommand::Unpause(reason)).await?,
            CliCommand::Visible => run_signal(ControlCommand::Visible).await?,
            CliCommand::Hidden => run_signal(ControlCommand::Hidden).await?,
            CliCommand::Refresh => run_signal(ControlCommand::Refresh).await?,
            CliCommand::Completions { shell } => run_completions(shell),
        }

        Ok(())
    }
}

/// Flag or env var first, then the config file.
fn resolve_credential(flag: Option<String>, cfg: &QsyncConfig) -> Result<Credential> {
    let key = flag
        .filter(|k| !k.trim().is_empty())
        .or_else(|| cfg.api_key.clone().filter(|k| !k.trim().is_empty()));
    match key {
        Some(k) => Ok(Credential::new(k.trim())),
        None => bail!("no API key: pass --api-key, set QSYNC_API_KEY or api_key in the config file"),
    }
}

async fn open_session(flag: Option<String>, cfg: QsyncConfig) -> Result<Session<CurlTransport>> {
    let credential = resolve_credential(flag, &cfg)?;
    let history = match HistoryStore::open_default().await {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!("link history unavailable: {e:#}");
            None
        }
    };
    Ok(Session::create(
        credential,
        cfg,
        Arc::new(CurlTransport::new()),
        history,
    ))
}

#[cfg(test)]
mod tests;
