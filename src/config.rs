use std::time::Duration;

use crate::error::{AppError, Result};
use crate::live::MonitorConfig;

/// Seconds between poll cycles.
pub const TICK_INTERVAL_SECS: u64 = 60;

/// Bounds of the randomized per-event poll interval (seconds).
pub const MIN_POLL_INTERVAL_SECS: u64 = 5 * 60;
pub const MAX_POLL_INTERVAL_SECS: u64 = 10 * 60;

/// Events polled per cycle. Keeps the external request rate flat when many
/// cards are live at once.
pub const MAX_POLL_PER_TICK: usize = 1;

/// Delay after the 1st, 2nd, 3rd+ consecutive fetch failure (seconds).
pub const RETRY_BACKOFF_SECS: &[u64] = &[10 * 60, 20 * 60, 40 * 60];

/// A live event whose start is older than this is force-completed.
pub const STALE_LIVE_WINDOW_HOURS: u64 = 18;

/// Per-request timeout for the snapshot feed. Must stay below the tick.
pub const FETCH_TIMEOUT_SECS: u64 = 20;

/// Promotion whose cards the monitor tracks; other orgs are stored but
/// never polled.
pub const TRACKED_ORG: &str = "UFC";

pub const DEFAULT_USER_AGENT: &str = "fightcard-live/0.1";

/// Cache TTLs, mirroring how often each view can go stale.
pub mod cache_ttl {
    pub const LIVE_DETAIL_SECS: u64 = 20;
    pub const DETAIL_SECS: u64 = 120;
    pub const LIST_SECS: u64 = 60;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// LIVE_TICK_INTERVAL_SECS
    pub tick_interval_secs: u64,
    /// LIVE_MIN_POLL_SECS
    pub min_poll_interval_secs: u64,
    /// LIVE_MAX_POLL_SECS
    pub max_poll_interval_secs: u64,
    /// LIVE_MAX_POLL_PER_TICK
    pub max_poll_per_tick: usize,
    /// LIVE_BACKOFF_SECS, comma-separated, e.g. "600,1200,2400"
    pub backoff_secs: Vec<u64>,
    /// LIVE_STALE_WINDOW_HOURS
    pub stale_window_hours: u64,
    /// FETCH_TIMEOUT_SECS
    pub fetch_timeout_secs: u64,
    /// FETCH_USER_AGENT
    pub user_agent: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "fightcard.db".to_string()),
            api_port: env_parse("API_PORT", 3000)?,
            tick_interval_secs: env_parse("LIVE_TICK_INTERVAL_SECS", TICK_INTERVAL_SECS)?,
            min_poll_interval_secs: env_parse("LIVE_MIN_POLL_SECS", MIN_POLL_INTERVAL_SECS)?,
            max_poll_interval_secs: env_parse("LIVE_MAX_POLL_SECS", MAX_POLL_INTERVAL_SECS)?,
            max_poll_per_tick: env_parse("LIVE_MAX_POLL_PER_TICK", MAX_POLL_PER_TICK)?,
            backoff_secs: match std::env::var("LIVE_BACKOFF_SECS") {
                Ok(raw) => parse_secs_list(&raw)?,
                Err(_) => RETRY_BACKOFF_SECS.to_vec(),
            },
            stale_window_hours: env_parse("LIVE_STALE_WINDOW_HOURS", STALE_LIVE_WINDOW_HOURS)?,
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", FETCH_TIMEOUT_SECS)?,
            user_agent: std::env::var("FETCH_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
        })
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            tick_interval: Duration::from_secs(self.tick_interval_secs),
            min_poll_interval: Duration::from_secs(self.min_poll_interval_secs),
            max_poll_interval: Duration::from_secs(self.max_poll_interval_secs),
            max_poll_per_tick: self.max_poll_per_tick,
            backoff_plan: self.backoff_secs.iter().copied().map(Duration::from_secs).collect(),
            stale_live_window: Duration::from_secs(self.stale_window_hours * 3600),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
        .normalized()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a valid number, got {raw:?}"))),
        _ => Ok(default),
    }
}

fn parse_secs_list(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>().map_err(|_| {
                AppError::Config(format!("LIVE_BACKOFF_SECS entries must be seconds, got {s:?}"))
            })
        })
        .collect()
}
