//! Centralized error handling for cardiff.
//!
//! Mirrors the taxonomy style of a capability-oriented Rust service: one closed
//! top-level enum with per-domain nested variants, `Display` impls, and `From`
//! conversions so call sites can use `?` freely.

use std::fmt;
use std::io;

/// Top-level error type for the cardiff application.
#[derive(Debug)]
pub enum CardiffError {
    /// Configuration loading or validation errors.
    Config(ConfigError),
    /// Socket binding/connect/send errors.
    Network(NetworkError),
    /// Statsd line parsing errors (only surfaced internally; parse failures
    /// never propagate out of the ingest path, they bump `bad_lines_seen`).
    Parse(ParseError),
    /// Snapshot delivery / sink errors.
    Stats(StatsError),
    /// System-level errors (resource sampling, process limits).
    System(SystemError),
    /// I/O errors not otherwise classified.
    Io(io::Error),
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    FileNotFound(String),
    ParseError(String),
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub fn new(reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: "config".to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug)]
pub enum NetworkError {
    BindFailed { addr: String, reason: String },
    ConnectFailed { addr: String, reason: String },
    SendFailed(String),
}

#[derive(Debug, PartialEq)]
pub enum ParseError {
    UnknownKind(String),
    InvalidSampleRate(String),
    EmptyLine,
}

#[derive(Debug)]
pub enum StatsError {
    DeliveryFailed { sink: String, reason: String },
    SerializationError(String),
    DeliveryTimeout { sink: String },
}

#[derive(Debug)]
pub enum SystemError {
    ResourceSamplingFailed(String),
}

impl fmt::Display for CardiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardiffError::Config(e) => write!(f, "configuration error: {e}"),
            CardiffError::Network(e) => write!(f, "network error: {e}"),
            CardiffError::Parse(e) => write!(f, "parse error: {e}"),
            CardiffError::Stats(e) => write!(f, "stats error: {e}"),
            CardiffError::System(e) => write!(f, "system error: {e}"),
            CardiffError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "config file not found: {path}"),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {msg}"),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{field}': {reason}")
            }
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::BindFailed { addr, reason } => {
                write!(f, "failed to bind {addr}: {reason}")
            }
            NetworkError::ConnectFailed { addr, reason } => {
                write!(f, "failed to connect to {addr}: {reason}")
            }
            NetworkError::SendFailed(msg) => write!(f, "failed to send: {msg}"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownKind(kind) => write!(f, "unknown metric kind '{kind}'"),
            ParseError::InvalidSampleRate(rate) => write!(f, "invalid sample rate '{rate}'"),
            ParseError::EmptyLine => write!(f, "empty line"),
        }
    }
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsError::DeliveryFailed { sink, reason } => {
                write!(f, "delivery to '{sink}' failed: {reason}")
            }
            StatsError::SerializationError(msg) => write!(f, "serialization error: {msg}"),
            StatsError::DeliveryTimeout { sink } => write!(f, "delivery to '{sink}' timed out"),
        }
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemError::ResourceSamplingFailed(msg) => {
                write!(f, "failed to sample resource usage: {msg}")
            }
        }
    }
}

impl std::error::Error for CardiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CardiffError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for NetworkError {}
impl std::error::Error for ParseError {}
impl std::error::Error for StatsError {}
impl std::error::Error for SystemError {}

impl From<io::Error> for CardiffError {
    fn from(error: io::Error) -> Self {
        CardiffError::Io(error)
    }
}

impl From<ConfigError> for CardiffError {
    fn from(error: ConfigError) -> Self {
        CardiffError::Config(error)
    }
}

impl From<NetworkError> for CardiffError {
    fn from(error: NetworkError) -> Self {
        CardiffError::Network(error)
    }
}

impl From<ParseError> for CardiffError {
    fn from(error: ParseError) -> Self {
        CardiffError::Parse(error)
    }
}

impl From<StatsError> for CardiffError {
    fn from(error: StatsError) -> Self {
        CardiffError::Stats(error)
    }
}

impl From<SystemError> for CardiffError {
    fn from(error: SystemError) -> Self {
        CardiffError::System(error)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CardiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_is_stable() {
        let err = ConfigError::FileNotFound("cardiff.yaml".to_string());
        assert_eq!(err.to_string(), "config file not found: cardiff.yaml");
    }

    #[test]
    fn parse_error_display_is_stable() {
        let err = ParseError::UnknownKind("x".to_string());
        assert_eq!(err.to_string(), "unknown metric kind 'x'");
    }

    #[test]
    fn cardiff_error_wraps_domain_errors() {
        let err: CardiffError = ConfigError::new("bad field").into();
        assert!(err.to_string().starts_with("configuration error:"));
    }
}
