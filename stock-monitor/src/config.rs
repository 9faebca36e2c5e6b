//! Persisted user options
//!
//! Stored as JSON at `$STOCK_MONITOR_CONFIG` or
//! `<config dir>/stock-monitor/config.json`. Keys use the option names shown
//! to users (`list-of-stocks`, `subprocess-kill-delay`, ...).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::view::ColorPolicy;
use crate::watchlist::Watchlist;

pub const CONFIG_PATH_ENV: &str = "STOCK_MONITOR_CONFIG";
pub const STOCKS_ENV: &str = "STOCKS";
pub const REFRESH_SECS_ENV: &str = "REFRESH_SECS";

const APP_DIR: &str = "stock-monitor";
const CONFIG_FILE: &str = "config.json";

/// Longest fetch period accepted from `REFRESH_SECS`
pub const MAX_REFRESH_SECS: u64 = 24 * 60 * 60;

/// Worker deadline is `kill_delay × 10` seconds
pub const KILL_DELAY_UNIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub list_of_stocks: Watchlist,
    pub subprocess_kill_delay: u64,
    pub enable_log: bool,
    pub up_red_down_green: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            list_of_stocks: Watchlist::new(["BABA"]),
            subprocess_kill_delay: 12,
            enable_log: false,
            up_red_down_green: true,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Read the config at `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Like [`load`](Self::load) but falls back to defaults on a corrupt file
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Apply `STOCKS` (comma-separated) from the environment, if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(stocks) = std::env::var(STOCKS_ENV) {
            self.list_of_stocks = parse_stock_list(&stocks);
        }
        self
    }

    pub fn color_policy(&self) -> ColorPolicy {
        ColorPolicy::new(self.up_red_down_green)
    }

    /// Hard deadline for one background worker
    pub fn worker_deadline(&self) -> Duration {
        Duration::from_secs(
            self.subprocess_kill_delay
                .max(1)
                .saturating_mul(KILL_DELAY_UNIT.as_secs()),
        )
    }
}

pub fn parse_stock_list(raw: &str) -> Watchlist {
    Watchlist::new(raw.split(',').map(str::trim).filter(|s| !s.is_empty()))
}

/// Fetch period from `REFRESH_SECS`
pub fn refresh_period_from_env(default: Duration) -> Duration {
    std::env::var(REFRESH_SECS_ENV)
        .ok()
        .and_then(|raw| parse_refresh_secs(&raw))
        .unwrap_or(default)
}

/// Parse a fetch period in whole seconds, clamped to `1..=MAX_REFRESH_SECS`
pub fn parse_refresh_secs(raw: &str) -> Option<Duration> {
    let secs = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs.clamp(1, MAX_REFRESH_SECS)))
}
