//! Statsd-line relay sink, grounded in the original's `StatsdBackend`: opens
//! a fresh UDP socket per delivery, re-emits counters/gauges/sets/timers in
//! statsd wire format. Timers are collapsed to `key:mean_ms|ms|count`,
//! matching `format_timers`'s `%0.3f|ms|%i` line. Keys carry the
//! `<prefix>.<kind_prefix>` namespace per §6, applied uniformly across every
//! sink.

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::warn;

use crate::error::StatsError;
use crate::metrics::Snapshot;
use crate::sinks::{format_key, Sink, SinkHealth};

pub struct StatsdRelaySink {
    addr: String,
    prefix: String,
    health: SinkHealth,
}

impl StatsdRelaySink {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            addr: format!("{}:{port}", host.into()),
            prefix: crate::constants::DEFAULT_METRIC_PREFIX.to_string(),
            health: SinkHealth::new(),
        }
    }

    fn format_lines(&self, snapshot: &Snapshot) -> Vec<String> {
        let mut lines = Vec::new();
        for (key, value) in &snapshot.counters {
            let key = format_key(&self.prefix, crate::constants::COUNTER_PREFIX, key);
            lines.push(format!("{key}:{value}|c"));
        }
        for (key, value) in &snapshot.gauges {
            let key = format_key(&self.prefix, crate::constants::GAUGE_PREFIX, key);
            lines.push(format!("{key}:{value}|g"));
        }
        for (key, occurrences) in &snapshot.sets {
            let key = format_key(&self.prefix, crate::constants::SET_PREFIX, key);
            for item in occurrences.keys() {
                lines.push(format!("{key}:{item}|s"));
            }
        }
        for (key, values) in &snapshot.timers {
            if values.is_empty() {
                continue;
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let key = format_key(&self.prefix, crate::constants::TIMER_PREFIX, key);
            lines.push(format!("{key}:{mean:.3}|ms|{}", values.len()));
        }
        lines
    }
}

#[async_trait]
impl Sink for StatsdRelaySink {
    fn name(&self) -> &'static str {
        "statsd_relay"
    }

    async fn deliver(&self, snapshot: &Snapshot) {
        let lines = self.format_lines(snapshot);
        if lines.is_empty() {
            return;
        }

        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(error) => {
                let error = StatsError::DeliveryFailed {
                    sink: self.name().to_string(),
                    reason: format!("failed to bind local socket: {error}"),
                };
                warn!("{error}");
                self.health.record_exception();
                return;
            }
        };

        if let Err(error) = socket.connect(&self.addr).await {
            let error = StatsError::DeliveryFailed {
                sink: self.name().to_string(),
                reason: format!("failed to connect to {}: {error}", self.addr),
            };
            warn!("{error}");
            self.health.record_exception();
            return;
        }

        for line in lines {
            if let Err(error) = socket.send(line.as_bytes()).await {
                let error = StatsError::DeliveryFailed {
                    sink: self.name().to_string(),
                    reason: format!("send failed: {error}"),
                };
                warn!("{error}");
                self.health.record_exception();
                return;
            }
        }
    }

    fn exceptions(&self) -> u64 {
        self.health.exceptions()
    }

    fn last_exception(&self) -> i64 {
        self.health.last_exception()
    }

    fn note_timeout(&self) {
        self.health.record_exception();
    }
}
