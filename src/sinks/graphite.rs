//! Graphite sink: plaintext line protocol on port 2003, or pickle-batch
//! protocol on port 2004, grounded in the original's `GraphiteBackend`.
//!
//! Sets are never emitted to Graphite: the original only feeds
//! counters/gauges/timer_values into `deliver_plaintext_values` /
//! `deliver_pickled_values`, never `set_values` -- an omission carried
//! forward deliberately rather than "fixed".

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::warn;

use crate::constants::GRAPHITE_PICKLE_BATCH_SIZE;
use crate::error::StatsError;
use crate::metrics::stats::timer_stats;
use crate::metrics::Snapshot;
use crate::sinks::{format_internal_key, format_key, Sink, SinkHealth};

pub struct GraphiteSink {
    host: String,
    plaintext_port: u16,
    pickle_port: u16,
    use_pickle: bool,
    prefix: String,
    flush_interval_secs: u64,
    health: SinkHealth,
}

impl GraphiteSink {
    pub fn new(
        host: impl Into<String>,
        plaintext_port: u16,
        pickle_port: u16,
        use_pickle: bool,
        flush_interval_secs: u64,
    ) -> Self {
        Self {
            host: host.into(),
            plaintext_port,
            pickle_port,
            use_pickle,
            prefix: crate::constants::DEFAULT_METRIC_PREFIX.to_string(),
            flush_interval_secs,
            health: SinkHealth::new(),
        }
    }

    fn datapoints(&self, snapshot: &Snapshot) -> Vec<(String, f64)> {
        let mut points = Vec::new();
        for (key, value) in &snapshot.counters {
            points.push((format_key(&self.prefix, crate::constants::COUNTER_PREFIX, key), *value as f64));
        }
        for (key, value) in &snapshot.gauges {
            points.push((format_key(&self.prefix, crate::constants::GAUGE_PREFIX, key), *value as f64));
        }
        for (key, values) in &snapshot.timers {
            let stats = timer_stats(values, self.flush_interval_secs as f64);
            let base = format_key(&self.prefix, crate::constants::TIMER_PREFIX, key);
            points.push((format!("{base}.mean"), stats.mean));
            points.push((format!("{base}.median"), stats.median));
            points.push((format!("{base}.p90"), stats.p90));
            points.push((format!("{base}.p95"), stats.p95));
            points.push((format!("{base}.count"), stats.count as f64));
        }
        points.extend(self.internal_datapoints(snapshot));
        points
    }

    /// Self-telemetry datapoints under `internal.<kind_prefix>`, grounded on
    /// the original's `deliver_internal_stats` (§6 "internal metrics are
    /// emitted under `internal.<kind_prefix>`").
    fn internal_datapoints(&self, snapshot: &Snapshot) -> Vec<(String, f64)> {
        let mut points = Vec::new();
        for ((scope, host), counters) in snapshot.internal.counters() {
            for (name, value) in counters {
                let key = format_internal_key(&self.prefix, crate::constants::COUNTER_PREFIX, scope.as_str(), host, name);
                points.push((key, *value as f64));
            }
        }
        for ((scope, host), gauges) in snapshot.internal.gauges() {
            for (name, value) in gauges {
                let key = format_internal_key(&self.prefix, crate::constants::GAUGE_PREFIX, scope.as_str(), host, name);
                points.push((key, *value as f64));
            }
        }
        for ((scope, host), timers) in snapshot.internal.timers() {
            for (name, values) in timers {
                let stats = timer_stats(values, self.flush_interval_secs as f64);
                let base = format_internal_key(&self.prefix, crate::constants::TIMER_PREFIX, scope.as_str(), host, name);
                points.push((format!("{base}.mean"), stats.mean));
                points.push((format!("{base}.median"), stats.median));
                points.push((format!("{base}.p90"), stats.p90));
                points.push((format!("{base}.p95"), stats.p95));
                points.push((format!("{base}.count"), stats.count as f64));
            }
        }
        points
    }
}

#[async_trait]
impl Sink for GraphiteSink {
    fn name(&self) -> &'static str {
        "graphite"
    }

    async fn deliver(&self, snapshot: &Snapshot) {
        let points = self.datapoints(snapshot);
        if points.is_empty() {
            return;
        }

        let port = if self.use_pickle { self.pickle_port } else { self.plaintext_port };
        let stream = match TcpStream::connect((self.host.as_str(), port)).await {
            Ok(stream) => stream,
            Err(error) => {
                let error = StatsError::DeliveryFailed {
                    sink: self.name().to_string(),
                    reason: format!("connect to {}:{port}: {error}", self.host),
                };
                warn!("{error}");
                self.health.record_exception();
                return;
            }
        };

        let result = if self.use_pickle {
            deliver_pickled(stream, snapshot.epoch_ts, &points).await
        } else {
            deliver_plaintext(stream, snapshot.epoch_ts, &points).await
        };

        if let Err(error) = result {
            let error = StatsError::DeliveryFailed {
                sink: self.name().to_string(),
                reason: error.to_string(),
            };
            warn!("{error}");
            self.health.record_exception();
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

async fn deliver_plaintext(
    mut stream: TcpStream,
    epoch_ts: i64,
    points: &[(String, f64)],
) -> std::io::Result<()> {
    for (path, value) in points {
        let line = format!("{path} {value} {epoch_ts}\n");
        stream.write_all(line.as_bytes()).await?;
    }
    Ok(())
}

async fn deliver_pickled(
    mut stream: TcpStream,
    epoch_ts: i64,
    points: &[(String, f64)],
) -> std::io::Result<()> {
    for batch in points.chunks(GRAPHITE_PICKLE_BATCH_SIZE) {
        let encoded: Vec<(String, (i64, f64))> =
            batch.iter().map(|(path, value)| (path.clone(), (epoch_ts, *value))).collect();

        let pickled = serde_pickle::to_vec(&encoded, Default::default())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        stream.write_all(&(pickled.len() as u32).to_be_bytes()).await?;
        stream.write_all(&pickled).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datapoints_omit_sets() {
        let sink = GraphiteSink::new("127.0.0.1", 2003, 2004, false, 10);
        let mut snapshot = Snapshot::default();
        snapshot.counters.insert("foo".to_string(), 1);
        snapshot
            .sets
            .entry("s".to_string())
            .or_default()
            .insert("a".to_string(), 1);

        let points = sink.datapoints(&snapshot);
        assert!(points.iter().any(|(k, _)| k == "cardiff.counters.foo"));
        assert!(!points.iter().any(|(k, _)| k.contains(".sets.")));
    }

    #[test]
    fn timer_datapoints_include_derived_stats() {
        let sink = GraphiteSink::new("127.0.0.1", 2003, 2004, false, 10);
        let mut snapshot = Snapshot::default();
        snapshot.timers.insert("t".to_string(), vec![10.0, 20.0, 30.0]);

        let points = sink.datapoints(&snapshot);
        assert!(points.iter().any(|(k, v)| k == "cardiff.timers.t.mean" && *v == 20.0));
        assert!(points.iter().any(|(k, _)| k == "cardiff.timers.t.p95"));
    }

    #[test]
    fn internal_telemetry_is_emitted_under_internal_kind_prefix() {
        use crate::metrics::internal::Scope;

        let sink = GraphiteSink::new("127.0.0.1", 2003, 2004, false, 10);
        let mut snapshot = Snapshot::default();
        snapshot.internal.incr(Scope::Controller, "host-a", "packets_received", 5);
        snapshot.internal.set_gauge(Scope::Backend, "host-a", "graphite.exceptions", 1);
        snapshot.internal.push_timer(Scope::Controller, "host-a", "delivery_time", 12.0);

        let points = sink.datapoints(&snapshot);
        assert!(points.iter().any(|(k, v)| {
            *k == "cardiff.internal.counters.controller.host-a.packets_received" && *v == 5.0
        }));
        assert!(points.iter().any(|(k, v)| {
            *k == "cardiff.internal.gauges.backend.host-a.graphite.exceptions" && *v == 1.0
        }));
        assert!(points
            .iter()
            .any(|(k, _)| *k == "cardiff.internal.timers.controller.host-a.delivery_time.mean"));
    }

    #[test]
    fn health_starts_clean() {
        let sink = GraphiteSink::new("127.0.0.1", 2003, 2004, false, 10);
        assert_eq!(sink.exceptions(), 0);
        assert_eq!(sink.last_exception(), 0);
    }
}
