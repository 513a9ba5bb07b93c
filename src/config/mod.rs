//! Configuration management for cardiff.
//!
//! Collapsed from the teacher's multi-file `config` split (`builder.rs`,
//! `compatibility.rs`, `preset.rs`, `trait_impls.rs`) into one coherent
//! `Config` struct tree, since this crate has no preset or CLI-compatibility
//! surface to justify the extra files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants;
use crate::error::{ConfigError, Result};

/// Root configuration structure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default)]
    pub statsd: StatsdIngest,
    #[serde(default)]
    pub upstream: UpstreamIngest,
    #[serde(default)]
    pub backends: Backends,
}

fn default_flush_interval_secs() -> u64 {
    constants::DEFAULT_FLUSH_INTERVAL_SECS
}

/// UDP statsd ingest listener.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatsdIngest {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for StatsdIngest {
    fn default() -> Self {
        Self {
            enabled: true,
            host: constants::DEFAULT_STATSD_HOST.to_string(),
            port: constants::DEFAULT_STATSD_PORT,
        }
    }
}

/// TCP upstream merge listener.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UpstreamIngest {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for UpstreamIngest {
    fn default() -> Self {
        Self {
            enabled: false,
            host: constants::DEFAULT_UPSTREAM_HOST.to_string(),
            port: constants::DEFAULT_UPSTREAM_PORT,
        }
    }
}

/// One sub-table per sink, each individually enable-able.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Backends {
    #[serde(default)]
    pub logger: LoggerBackend,
    #[serde(default)]
    pub statsd_relay: StatsdRelayBackend,
    #[serde(default)]
    pub graphite: GraphiteBackend,
    #[serde(default)]
    pub amqp: AmqpBackend,
    #[serde(default)]
    pub upstream: UpstreamBackend,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggerBackend {
    pub enabled: bool,
}

impl Default for LoggerBackend {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatsdRelayBackend {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for StatsdRelayBackend {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: constants::DEFAULT_STATSD_PORT,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GraphiteBackend {
    pub enabled: bool,
    pub host: String,
    pub plaintext_port: u16,
    pub pickle_port: u16,
    #[serde(default = "default_use_pickle")]
    pub use_pickle: bool,
}

fn default_use_pickle() -> bool {
    false
}

impl Default for GraphiteBackend {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            plaintext_port: constants::DEFAULT_GRAPHITE_PLAINTEXT_PORT,
            pickle_port: constants::DEFAULT_GRAPHITE_PICKLE_PORT,
            use_pickle: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AmqpBackend {
    pub enabled: bool,
    pub url: String,
    pub exchange: String,
}

impl Default for AmqpBackend {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "amqp://127.0.0.1:5672/%2f".to_string(),
            exchange: "cardiff".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UpstreamBackend {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for UpstreamBackend {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: constants::DEFAULT_UPSTREAM_PORT,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flush_interval_secs: constants::DEFAULT_FLUSH_INTERVAL_SECS,
            statsd: StatsdIngest::default(),
            upstream: UpstreamIngest::default(),
            backends: Backends::default(),
        }
    }
}

/// Load configuration from an optional YAML file, falling back to
/// `Config::default()` when the path is absent.
pub fn load_config(path: Option<&str>) -> Result<Config> {
    let config_path = path.unwrap_or(constants::DEFAULT_CONFIG_FILE);

    if !Path::new(config_path).exists() {
        info!("config file not found at {}, using defaults", config_path);
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(config_path)
        .map_err(|e| ConfigError::new(format!("failed to read config file: {e}")))?;

    let config: Config = serde_yaml::from_str(&contents)
        .map_err(|e| ConfigError::new(format!("failed to parse config: {e}")))?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate a loaded or overridden configuration before the server starts.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.flush_interval_secs == 0 {
        return Err(ConfigError::new("flush_interval_secs must be greater than 0").into());
    }

    if !config.statsd.enabled && !config.upstream.enabled {
        return Err(ConfigError::new("at least one of statsd or upstream ingest must be enabled").into());
    }

    if config.backends.graphite.enabled
        && config.backends.graphite.plaintext_port == config.backends.graphite.pickle_port
    {
        return Err(ConfigError::new("graphite plaintext_port and pickle_port must differ").into());
    }

    if config.backends.amqp.enabled && config.backends.amqp.exchange.is_empty() {
        return Err(ConfigError::new("amqp exchange must not be empty when amqp backend is enabled").into());
    }

    Ok(())
}
