use std::net::SocketAddr;
use std::time::Duration;

use bigbrotr_engine::EngineConfig;
use bigbrotr_fabric::FabricConfig;
use bigbrotr_model::{Filter, Keys};
use bigbrotr_probe::ProbeConfig;
use bigbrotr_store::PoolBounds;
use thiserror::Error;

/// Configuration errors, surfaced by the binary as a nonzero exit per the "configuration error
/// at startup: log and exit nonzero" rule.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for environment variable {0}: {1}")]
    Invalid(&'static str, String),
}

/// Everything the binary needs to wire up a run, loaded from environment variables. This is the
/// one place in the workspace that reads `std::env` — every core crate only ever sees the typed
/// config records (`EngineConfig`, `FabricConfig`, `ProbeConfig`, `PoolBounds`) this builds.
pub struct Config {
    pub database_url: String,
    pub pool_bounds: PoolBounds,
    pub tor_proxy_addr: SocketAddr,
    pub signing_keys: Keys,
    pub relays_seed_path: Option<String>,
    pub priority_relays_path: Option<String>,
    pub filter: Filter,
    pub engine: EngineConfig,
    pub fabric: FabricConfig,
    pub probe: ProbeConfig,
    pub monitor_interval: Duration,
    pub monitor_staleness: Duration,
    pub synchronizer_interval: Duration,
    pub priority_synchronizer_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require("DATABASE_URL")?;
        let tor_proxy_addr = env_or("TOR_PROXY_ADDR", "127.0.0.1:9050")
            .parse()
            .map_err(|_| ConfigError::Invalid("TOR_PROXY_ADDR", env_or("TOR_PROXY_ADDR", "")))?;

        let signing_keys = match std::env::var("SIGNING_KEY_HEX") {
            Ok(hex) => Keys::from_secret_hex(&hex)
                .map_err(|err| ConfigError::Invalid("SIGNING_KEY_HEX", err.to_string()))?,
            Err(_) => Keys::generate(),
        };

        let filter = match std::env::var("FILTER_JSON") {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|err| ConfigError::Invalid("FILTER_JSON", err.to_string()))?,
            Err(_) => Filter::default(),
        };

        let pool_bounds = PoolBounds {
            min_size: parse_env_or("DB_POOL_MIN_SIZE", PoolBounds::default().min_size)?,
            max_size: parse_env_or("DB_POOL_MAX_SIZE", PoolBounds::default().max_size)?,
            acquire_timeout_secs: parse_env_or(
                "DB_POOL_ACQUIRE_TIMEOUT_SECS",
                PoolBounds::default().acquire_timeout_secs,
            )?,
        };

        let fabric = FabricConfig {
            processes: parse_env_or("NUM_CORES", FabricConfig::default().processes)?,
            threads_per_process: parse_env_or(
                "REQUESTS_PER_CORE",
                FabricConfig::default().threads_per_process,
            )?,
            tasks_per_thread: parse_env_or(
                "TASKS_PER_THREAD",
                FabricConfig::default().tasks_per_thread,
            )?,
            relay_timeout: Duration::from_secs(parse_env_or(
                "RELAY_TIMEOUT_SECS",
                FabricConfig::default().relay_timeout.as_secs(),
            )?),
            ..FabricConfig::default()
        };

        let engine = EngineConfig {
            request_timeout: Duration::from_secs(parse_env_or(
                "REQUEST_TIMEOUT_SECS",
                EngineConfig::default().request_timeout.as_secs(),
            )?),
            ..EngineConfig::default()
        };

        Ok(Self {
            database_url,
            pool_bounds,
            tor_proxy_addr,
            signing_keys,
            relays_seed_path: std::env::var("RELAYS_SEED_PATH").ok(),
            priority_relays_path: std::env::var("PRIORITY_RELAYS_PATH").ok(),
            filter,
            engine,
            fabric,
            probe: ProbeConfig::default(),
            monitor_interval: Duration::from_secs(parse_env_or("MONITOR_INTERVAL_SECS", 3_600)?),
            monitor_staleness: Duration::from_secs(parse_env_or(
                "MONITOR_STALENESS_SECS",
                24 * 3_600,
            )?),
            synchronizer_interval: Duration::from_secs(parse_env_or(
                "SYNCHRONIZER_INTERVAL_SECS",
                900,
            )?),
            priority_synchronizer_interval: Duration::from_secs(parse_env_or(
                "PRIORITY_SYNCHRONIZER_INTERVAL_SECS",
                300,
            )?),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn env_or(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}
