//! cardiff: a statsd-compatible metrics aggregation server with
//! hierarchical clustering.
//!
//! Ingests statsd-protocol samples over UDP, aggregates them in memory
//! over a configurable flush interval, and fans aggregated snapshots out
//! to pluggable delivery sinks (logger, statsd relay, Graphite, AMQP,
//! upstream). A second TCP listener accepts merge payloads from downstream
//! Cardiff instances, enabling edge collectors to feed a central
//! aggregator.

pub mod cli;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod net;
pub mod sinks;

pub use config::Config;
pub use coordinator::Coordinator;
pub use error::{CardiffError, Result};
pub use metrics::{Aggregator, Snapshot};

use std::sync::Arc;

use tokio::sync::Mutex;

use sinks::Sink;

/// Shared reference to the live aggregator state, the only data multiple
/// tasks ever touch concurrently.
pub type AggregatorRef = Arc<Mutex<Aggregator>>;

static LOCAL_HOSTNAME: once_cell::sync::OnceCell<String> = once_cell::sync::OnceCell::new();

/// Return the local short hostname (first label before any `.`), the same
/// truncation the original's `hostname()` helper applies. The `gethostname(2)`
/// syscall runs at most once per process; every caller after the first
/// (coordinator, upstream sink, CLI startup log) reads the cached value.
pub fn local_hostname() -> String {
    LOCAL_HOSTNAME
        .get_or_init(|| {
            let mut buf = vec![0u8; 256];
            let result = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
            if result != 0 {
                return "localhost".to_string();
            }
            let nul = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            let raw = String::from_utf8_lossy(&buf[..nul]).to_string();
            raw.split('.').next().unwrap_or("localhost").to_string()
        })
        .clone()
}

/// Build the configured set of sinks from `Config::backends`, skipping any
/// sink whose `enabled` flag is false.
pub fn build_sinks(config: &Config, local_host: &str) -> Vec<Arc<dyn Sink>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    if config.backends.logger.enabled {
        sinks.push(Arc::new(sinks::logger::LoggerSink::new()));
    }
    if config.backends.statsd_relay.enabled {
        sinks.push(Arc::new(sinks::statsd_relay::StatsdRelaySink::new(
            config.backends.statsd_relay.host.clone(),
            config.backends.statsd_relay.port,
        )));
    }
    if config.backends.graphite.enabled {
        sinks.push(Arc::new(sinks::graphite::GraphiteSink::new(
            config.backends.graphite.host.clone(),
            config.backends.graphite.plaintext_port,
            config.backends.graphite.pickle_port,
            config.backends.graphite.use_pickle,
            config.flush_interval_secs,
        )));
    }
    if config.backends.amqp.enabled {
        sinks.push(Arc::new(sinks::amqp::AmqpSink::with_flush_interval(
            config.backends.amqp.url.clone(),
            config.backends.amqp.exchange.clone(),
            config.flush_interval_secs,
        )));
    }
    if config.backends.upstream.enabled {
        sinks.push(Arc::new(sinks::upstream::UpstreamSink::new(
            config.backends.upstream.host.clone(),
            config.backends.upstream.port,
            local_host.to_string(),
        )));
    }

    sinks
}
