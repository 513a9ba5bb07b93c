//! Command-line interface handling.
//!
//! Keeps `main.rs` focused on startup sequencing by handling argument
//! parsing and config-override merging here, the same split the teacher
//! uses between its `cli` module and `main.rs`.

use clap::Parser;

use crate::config::{load_config, validate_config, Config};
use crate::error::Result;

/// Hierarchical statsd-compatible metrics aggregation server.
#[derive(Debug, Parser)]
#[command(name = "cardiff", version, about)]
pub struct Cli {
    /// YAML configuration file path.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<String>,

    /// Override the flush interval, in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub flush_interval: Option<u64>,

    /// Override the statsd UDP ingest port.
    #[arg(long, value_name = "PORT")]
    pub statsd_port: Option<u16>,

    /// Override the upstream TCP merge port.
    #[arg(long, value_name = "PORT")]
    pub upstream_port: Option<u16>,

    /// Print the fully resolved configuration as YAML and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Validate the configuration and exit without starting the server.
    #[arg(long)]
    pub validate_config: bool,
}

/// Parse process arguments into a `Cli`.
pub fn parse_arguments() -> Cli {
    Cli::parse()
}

/// Load configuration per `--config`, then apply CLI overrides on top.
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = load_config(cli.config.as_deref())?;

    if let Some(secs) = cli.flush_interval {
        config.flush_interval_secs = secs;
    }
    if let Some(port) = cli.statsd_port {
        config.statsd.port = port;
    }
    if let Some(port) = cli.upstream_port {
        config.upstream.port = port;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Handle `--print-config` / `--validate-config`, the one-shot commands that
/// exit before the server starts. Returns `true` if one was handled.
pub fn handle_pre_execution_commands(cli: &Cli, config: &Config) -> Result<bool> {
    if cli.print_config {
        let yaml = serde_yaml::to_string(config)
            .map_err(|e| crate::error::ConfigError::new(format!("failed to render config: {e}")))?;
        println!("{yaml}");
        return Ok(true);
    }

    if cli.validate_config {
        println!("configuration is valid");
        return Ok(true);
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_config_applies_cli_overrides() {
        let cli = Cli {
            config: None,
            flush_interval: Some(60),
            statsd_port: Some(9125),
            upstream_port: None,
            print_config: false,
            validate_config: false,
        };
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.flush_interval_secs, 60);
        assert_eq!(config.statsd.port, 9125);
        assert_eq!(config.upstream.port, Config::default().upstream.port);
    }

    #[test]
    fn print_config_is_handled_as_pre_execution_command() {
        let cli = Cli {
            config: None,
            flush_interval: None,
            statsd_port: None,
            upstream_port: None,
            print_config: true,
            validate_config: false,
        };
        let config = Config::default();
        assert!(handle_pre_execution_commands(&cli, &config).unwrap());
    }

    #[test]
    fn normal_run_does_not_trigger_pre_execution_commands() {
        let cli = Cli {
            config: None,
            flush_interval: None,
            statsd_port: None,
            upstream_port: None,
            print_config: false,
            validate_config: false,
        };
        let config = Config::default();
        assert!(!handle_pre_execution_commands(&cli, &config).unwrap());
    }
}
