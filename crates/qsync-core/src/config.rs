use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::poll::{BackgroundPolling, PollConfig};
use crate::rate_limit::RateLimitConfig;
use crate::retry::{PermanentErrors, RetryPolicy};

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

/// Rate-limit window for download-link requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRateConfig {
    #[serde(alias = "windowMs")]
    pub window_ms: u64,
    #[serde(alias = "maxCallsPerWindow")]
    pub max_calls_per_window: usize,
    #[serde(alias = "minIntervalMs")]
    pub min_interval_ms: u64,
}

impl Default for LinkRateConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_calls_per_window: 60,
            min_interval_ms: 0,
        }
    }
}

/// Auto-start policy for queued torrents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoStartConfig {
    pub enabled: bool,
    #[serde(alias = "concurrencyLimit")]
    pub concurrency_limit: usize,
}

impl Default for AutoStartConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            concurrency_limit: 3,
        }
    }
}

/// Global configuration loaded from `~/.config/qsync/config.toml`.
///
/// Every key is optional; missing keys take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QsyncConfig {
    /// Base URL of the upstream API (no trailing slash needed).
    pub api_base: String,
    /// API key; `QSYNC_API_KEY` or `--api-key` take precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Sliding window for list calls, per resource class.
    #[serde(alias = "windowMs")]
    pub window_ms: u64,
    #[serde(alias = "maxCallsPerWindow")]
    pub max_calls_per_window: usize,
    #[serde(alias = "minIntervalMs")]
    pub min_interval_ms: u64,
    /// Poll interval while visible (or while a fast-path override holds).
    #[serde(alias = "activeIntervalMs")]
    pub active_interval_ms: u64,
    /// Poll interval while hidden, when `background_polling = "slow"`.
    #[serde(alias = "inactiveIntervalMs")]
    pub inactive_interval_ms: u64,
    /// Link requests in flight per bulk chunk.
    #[serde(alias = "bulkConcurrency")]
    pub bulk_concurrency: usize,
    /// How long an issued link is reused.
    #[serde(alias = "linkFreshnessMs")]
    pub link_freshness_ms: u64,
    /// Hidden time after which becoming visible forces an immediate sync.
    pub hidden_resync_threshold_ms: u64,
    /// Minimum spacing between auto-start checks.
    pub auto_start_interval_ms: u64,
    pub background_polling: BackgroundPolling,
    /// Upstream error substrings that are never retried.
    pub permanent_errors: Vec<String>,
    pub link_rate: LinkRateConfig,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    pub auto_start: AutoStartConfig,
}

impl Default for QsyncConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.torbox.app/v1/api".to_string(),
            api_key: None,
            window_ms: 10_000,
            max_calls_per_window: 5,
            min_interval_ms: 2_000,
            active_interval_ms: 15_000,
            inactive_interval_ms: 60_000,
            bulk_concurrency: 3,
            link_freshness_ms: 3 * 60 * 60 * 1000,
            hidden_resync_threshold_ms: 10_000,
            auto_start_interval_ms: 30_000,
            background_polling: BackgroundPolling::Stop,
            permanent_errors: vec![
                "not found".to_string(),
                "insufficient storage".to_string(),
                "DATABASE_ERROR".to_string(),
                "BOZO_TORRENT".to_string(),
                "ITEM_NOT_FOUND".to_string(),
            ],
            link_rate: LinkRateConfig::default(),
            retry: None,
            auto_start: AutoStartConfig::default(),
        }
    }
}

impl QsyncConfig {
    pub fn sync_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_millis(self.window_ms),
            max_calls: self.max_calls_per_window.max(1),
            min_interval: Duration::from_millis(self.min_interval_ms),
        }
    }

    pub fn link_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_millis(self.link_rate.window_ms),
            max_calls: self.link_rate.max_calls_per_window.max(1),
            min_interval: Duration::from_millis(self.link_rate.min_interval_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_millis(r.base_delay_ms),
                max_delay: Duration::from_millis(r.max_delay_ms),
            },
            None => RetryPolicy::default(),
        }
    }

    pub fn permanent(&self) -> PermanentErrors {
        PermanentErrors::new(self.permanent_errors.iter().cloned())
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            active_interval: Duration::from_millis(self.active_interval_ms),
            inactive_interval: Duration::from_millis(self.inactive_interval_ms),
            hidden_resync_threshold: Duration::from_millis(self.hidden_resync_threshold_ms),
            background: self.background_polling,
        }
    }

    pub fn link_freshness(&self) -> Duration {
        Duration::from_millis(self.link_freshness_ms)
    }

    pub fn auto_start_interval(&self) -> Duration {
        Duration::from_millis(self.auto_start_interval_ms)
    }

    pub fn bulk_concurrency(&self) -> usize {
        self.bulk_concurrency.max(1)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("qsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<QsyncConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = QsyncConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: QsyncConfig = toml::from_str(&data)?;
    Ok(cfg)
}
