//! Human-readable logging sink, grounded in the original's `LoggerBackend`:
//! one `tracing::info!` line per metric, separated by kind, internal metrics
//! prefixed `Internal`. Keys carry the `<prefix>.<kind_prefix>` namespace
//! per §6, applied uniformly across every sink.

use async_trait::async_trait;
use tracing::info;

use crate::metrics::internal::Scope;
use crate::metrics::Snapshot;
use crate::sinks::{format_internal_key, format_key, Sink};

pub struct LoggerSink {
    prefix: String,
}

impl LoggerSink {
    pub fn new() -> Self {
        Self {
            prefix: crate::constants::DEFAULT_METRIC_PREFIX.to_string(),
        }
    }
}

impl Default for LoggerSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for LoggerSink {
    fn name(&self) -> &'static str {
        "logger"
    }

    async fn deliver(&self, snapshot: &Snapshot) {
        for (key, value) in &snapshot.counters {
            let key = format_key(&self.prefix, crate::constants::COUNTER_PREFIX, key);
            info!("Counter {key}={value}");
        }
        for (key, value) in &snapshot.gauges {
            let key = format_key(&self.prefix, crate::constants::GAUGE_PREFIX, key);
            info!("Gauge {key}={value}");
        }
        for (key, occurrences) in &snapshot.sets {
            let key = format_key(&self.prefix, crate::constants::SET_PREFIX, key);
            for (value, count) in occurrences {
                info!("Set {key} {value}={count}");
            }
        }
        for (key, values) in &snapshot.timers {
            let key = format_key(&self.prefix, crate::constants::TIMER_PREFIX, key);
            for value in values {
                info!("Timer {key} {value}");
            }
        }

        for ((scope, host), counters) in snapshot.internal.counters() {
            for (name, value) in counters {
                let key = format_internal_key(&self.prefix, crate::constants::COUNTER_PREFIX, scope.as_str(), host, name);
                info!("Internal Counter {key}={value}");
            }
        }
        for ((scope, host), gauges) in snapshot.internal.gauges() {
            for (name, value) in gauges {
                let key = format_internal_key(&self.prefix, crate::constants::GAUGE_PREFIX, scope.as_str(), host, name);
                info!("Internal Gauge {key}={value}");
            }
        }
        for ((scope, host), timers) in snapshot.internal.timers() {
            for (name, values) in timers {
                let key = format_internal_key(&self.prefix, crate::constants::TIMER_PREFIX, scope.as_str(), host, name);
                for value in values {
                    info!("Internal Timer {key} {value}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.counters.insert("requests".to_string(), 5);
        snapshot.gauges.insert("queue_depth".to_string(), 3);
        snapshot
            .internal
            .incr(Scope::Controller, "host-a", "bad_lines_seen", 1);
        snapshot
    }

    #[tokio::test]
    async fn deliver_does_not_panic_on_empty_snapshot() {
        let sink = LoggerSink::new();
        sink.deliver(&Snapshot::default()).await;
    }

    #[tokio::test]
    async fn deliver_handles_populated_snapshot() {
        let sink = LoggerSink::new();
        sink.deliver(&sample_snapshot()).await;
    }

    #[test]
    fn format_key_prepends_prefix_and_kind() {
        assert_eq!(format_key("cardiff", "counters", "requests"), "cardiff.counters.requests");
    }
}
