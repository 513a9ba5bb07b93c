//! Sink contract and concrete delivery backends (component J).
//!
//! Every sink implements the same `deliver` contract the original's
//! `Backend.deliver()` establishes: handed a full snapshot, free to drop it
//! on any transient failure without propagating the error back to the
//! coordinator (the coordinator only cares about duration / success for its
//! own internal telemetry).

pub mod amqp;
pub mod graphite;
pub mod logger;
pub mod statsd_relay;
pub mod upstream;

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::metrics::Snapshot;

/// Uniform delivery interface implemented by every sink.
///
/// `deliver` takes `&Snapshot` rather than owning it since every sink in the
/// fan-out set reads the same snapshot concurrently.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Stable short name, used in internal telemetry keys
    /// (`delivery.<name>.duration_ms`) and log lines.
    fn name(&self) -> &'static str;

    /// Deliver one snapshot. Implementations must never panic on a
    /// transport failure; log and return quietly instead, since a failed
    /// delivery is accounted for by the coordinator's timeout/duration
    /// bookkeeping, not by sink-level error propagation.
    async fn deliver(&self, snapshot: &Snapshot);

    /// Cumulative transport exceptions recorded since the sink was
    /// constructed (§4.4, §7 `SocketError`). `0` for sinks with no
    /// transport to fail, such as the logger.
    fn exceptions(&self) -> u64 {
        0
    }

    /// Epoch seconds of the most recent transport exception, `0` if none
    /// has occurred yet.
    fn last_exception(&self) -> i64 {
        0
    }

    /// Record a coordinator-observed delivery timeout. `SinkTimeout` is
    /// treated as a `SocketError` for this sink's own bookkeeping (§7).
    fn note_timeout(&self) {}
}

/// `<prefix>.<kind_prefix>.<key>`, the key formatting shared by every sink
/// that mirrors Graphite/AMQP-style dotted namespacing.
pub fn format_key(prefix: &str, kind_prefix: &str, key: &str) -> String {
    format!("{prefix}.{kind_prefix}.{key}")
}

/// `<prefix>.internal.<kind_prefix>.<scope>.<host>.<name>`, the dotted path
/// self-telemetry leaves take on the wire, mirroring the original's
/// `internal.<counter_prefix|gauge_prefix|timer_prefix>` routing built from
/// the flattened `{scope: {host: {name: value}}}` tree (§6).
pub fn format_internal_key(prefix: &str, kind_prefix: &str, scope: &str, host: &str, name: &str) -> String {
    format!(
        "{prefix}.{}.{kind_prefix}.{scope}.{host}.{name}",
        crate::constants::INTERNAL_PREFIX
    )
}

/// Per-sink delivery-exception bookkeeping, mirroring the original's
/// `self.exceptions` / `self.last_exception` fields on each backend (§4.4,
/// §7 `SocketError`): a transport failure bumps the count and stamps the
/// epoch-second timestamp, read back by the coordinator after every flush.
#[derive(Default)]
pub struct SinkHealth {
    exceptions: AtomicU64,
    last_exception: AtomicI64,
}

impl SinkHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one transport failure.
    pub fn record_exception(&self) {
        self.exceptions.fetch_add(1, Ordering::SeqCst);
        self.last_exception.store(current_epoch_secs(), Ordering::SeqCst);
    }

    pub fn exceptions(&self) -> u64 {
        self.exceptions.load(Ordering::SeqCst)
    }

    pub fn last_exception(&self) -> i64 {
        self.last_exception.load(Ordering::SeqCst)
    }
}

fn current_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_health_starts_at_zero() {
        let health = SinkHealth::new();
        assert_eq!(health.exceptions(), 0);
        assert_eq!(health.last_exception(), 0);
    }

    #[test]
    fn sink_health_records_exceptions() {
        let health = SinkHealth::new();
        health.record_exception();
        health.record_exception();
        assert_eq!(health.exceptions(), 2);
        assert!(health.last_exception() > 0);
    }

    #[test]
    fn format_internal_key_nests_scope_host_and_name() {
        let key = format_internal_key("cardiff", "counters", "controller", "host-a", "packets_received");
        assert_eq!(key, "cardiff.internal.counters.controller.host-a.packets_received");
    }
}
