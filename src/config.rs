//! Server configuration loaded from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Directory of the JSON document store
    pub data_dir: PathBuf,
    /// Directory served as static fallback
    pub static_dir: PathBuf,
    /// Maximum stored comments, oldest dropped first (0 = unbounded)
    pub comment_history_limit: usize,
    /// Maximum serialized size of a single comment payload
    pub comment_max_bytes: usize,
    /// Comments one connection may post per window
    pub comment_rate_max: u32,
    pub comment_rate_window: Duration,
    /// Fixed seed for the daily draw (reproducible runs)
    pub rng_seed: Option<u64>,
    /// How often the rollover watcher checks the date
    pub rollover_check_interval: Duration,
    /// Capacity of the live comment channel; peers lagging further are dropped
    pub broadcast_capacity: usize,
    /// Sessions unused for this long are dropped
    pub session_idle_ttl: Duration,
    /// How often idle sessions and stale rate limit entries are swept
    pub sweep_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("data"),
            static_dir: PathBuf::from("static"),
            comment_history_limit: 1000,
            comment_max_bytes: 2000,
            comment_rate_max: 10,
            comment_rate_window: Duration::from_secs(10),
            rng_seed: None,
            rollover_check_interval: Duration::from_secs(30),
            broadcast_capacity: 256,
            session_idle_ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = raw, "Ignoring unparseable environment variable");
            None
        }
    }
}

impl AppConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            bind_addr: env_parse("BIND_ADDR").unwrap_or(defaults.bind_addr),
            data_dir: std::env::var("DATA_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            static_dir: std::env::var("STATIC_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            comment_history_limit: env_parse("COMMENT_HISTORY_LIMIT")
                .unwrap_or(defaults.comment_history_limit),
            comment_max_bytes: env_parse("COMMENT_MAX_BYTES").unwrap_or(defaults.comment_max_bytes),
            comment_rate_max: env_parse("COMMENT_RATE_MAX").unwrap_or(defaults.comment_rate_max),
            comment_rate_window: env_parse("COMMENT_RATE_WINDOW")
                .map(Duration::from_secs)
                .unwrap_or(defaults.comment_rate_window),
            rng_seed: env_parse("RNG_SEED"),
            rollover_check_interval: env_parse("ROLLOVER_CHECK_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.rollover_check_interval),
            broadcast_capacity: env_parse("BROADCAST_CAPACITY")
                .filter(|cap: &usize| *cap > 0)
                .unwrap_or(defaults.broadcast_capacity),
            session_idle_ttl: env_parse("SESSION_IDLE_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_idle_ttl),
            sweep_interval: env_parse("SWEEP_INTERVAL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
        };

        tracing::info!(
            bind_addr = %config.bind_addr,
            data_dir = %config.data_dir.display(),
            comment_history_limit = config.comment_history_limit,
            seeded = config.rng_seed.is_some(),
            "Config loaded"
        );

        config
    }
}
