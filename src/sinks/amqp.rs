//! AMQP sink, grounded in the original's `AMQPBackend`: one message per
//! metric, routing key `<prefix>.<kind_prefix>.<key>`, headers carrying
//! `app_id=cardiff`, `content-type=text/plain`, a timestamp, and a
//! `message_type`.
//!
//! The original labels every published message (including timers) with
//! `message_type=counter` -- `send_timers` passes `controller.METRICS_COUNTER`
//! instead of a timer-specific constant. That mislabeling is reproduced here
//! rather than corrected.

use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::types::ShortString;
use lapin::{BasicProperties, Connection, ConnectionProperties};
use tracing::warn;

use crate::constants::{COUNTER_PREFIX, GAUGE_PREFIX};
use crate::error::StatsError;
use crate::metrics::stats::timer_stats;
use crate::metrics::Snapshot;
use crate::sinks::{format_internal_key, format_key, Sink, SinkHealth};

pub struct AmqpSink {
    url: String,
    exchange: String,
    prefix: String,
    flush_interval_secs: u64,
    health: SinkHealth,
}

impl AmqpSink {
    pub fn new(url: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self::with_flush_interval(url, exchange, crate::constants::DEFAULT_FLUSH_INTERVAL_SECS)
    }

    pub fn with_flush_interval(url: impl Into<String>, exchange: impl Into<String>, flush_interval_secs: u64) -> Self {
        Self {
            url: url.into(),
            exchange: exchange.into(),
            prefix: crate::constants::DEFAULT_METRIC_PREFIX.to_string(),
            flush_interval_secs,
            health: SinkHealth::new(),
        }
    }

    async fn publish_all(&self, snapshot: &Snapshot) -> Result<(), lapin::Error> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        let timestamp = snapshot.epoch_ts.max(0) as u64;

        for (key, value) in &snapshot.counters {
            let routing_key = format_key(&self.prefix, COUNTER_PREFIX, key);
            publish(&channel, &self.exchange, &routing_key, &value.to_string(), "counter", timestamp).await?;
        }
        for (key, value) in &snapshot.gauges {
            let routing_key = format_key(&self.prefix, GAUGE_PREFIX, key);
            publish(&channel, &self.exchange, &routing_key, &value.to_string(), "gauge", timestamp).await?;
        }
        for (key, values) in &snapshot.timers {
            if values.is_empty() {
                continue;
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let routing_key = format_key(&self.prefix, crate::constants::TIMER_PREFIX, key);
            // message_type is "counter" here deliberately, matching the original's quirk.
            publish(&channel, &self.exchange, &routing_key, &format!("{mean:.3}"), "counter", timestamp).await?;
        }

        self.publish_internal_stats(&channel, snapshot, timestamp).await?;

        connection.close(200, "flush complete").await?;
        Ok(())
    }

    /// Publish self-telemetry under `internal.<kind_prefix>` routing keys,
    /// grounded on the original's `send_internal_stats` (§6 "internal
    /// metrics are emitted under `internal.<kind_prefix>`").
    async fn publish_internal_stats(
        &self,
        channel: &lapin::Channel,
        snapshot: &Snapshot,
        timestamp: u64,
    ) -> Result<(), lapin::Error> {
        for ((scope, host), counters) in snapshot.internal.counters() {
            for (name, value) in counters {
                let routing_key = format_internal_key(&self.prefix, COUNTER_PREFIX, scope.as_str(), host, name);
                publish(channel, &self.exchange, &routing_key, &value.to_string(), "counter", timestamp).await?;
            }
        }
        for ((scope, host), gauges) in snapshot.internal.gauges() {
            for (name, value) in gauges {
                let routing_key = format_internal_key(&self.prefix, GAUGE_PREFIX, scope.as_str(), host, name);
                publish(channel, &self.exchange, &routing_key, &value.to_string(), "gauge", timestamp).await?;
            }
        }
        for ((scope, host), timers) in snapshot.internal.timers() {
            for (name, values) in timers {
                if values.is_empty() {
                    continue;
                }
                let stats = timer_stats(values, self.flush_interval_secs as f64);
                let routing_key =
                    format_internal_key(&self.prefix, crate::constants::TIMER_PREFIX, scope.as_str(), host, name);
                // message_type is "counter" here too, matching the public-timer quirk.
                publish(channel, &self.exchange, &routing_key, &format!("{:.3}", stats.mean), "counter", timestamp)
                    .await?;
            }
        }
        Ok(())
    }
}

async fn publish(
    channel: &lapin::Channel,
    exchange: &str,
    routing_key: &str,
    body: &str,
    message_type: &str,
    timestamp: u64,
) -> Result<(), lapin::Error> {
    let properties = BasicProperties::default()
        .with_app_id(ShortString::from("cardiff"))
        .with_content_type(ShortString::from("text/plain"))
        .with_timestamp(timestamp)
        .with_kind(ShortString::from(message_type));

    channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            body.as_bytes(),
            properties,
        )
        .await?
        .await?;
    Ok(())
}

#[async_trait]
impl Sink for AmqpSink {
    fn name(&self) -> &'static str {
        "amqp"
    }

    async fn deliver(&self, snapshot: &Snapshot) {
        if let Err(error) = self.publish_all(snapshot).await {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::internal::Scope;

    #[test]
    fn health_starts_clean() {
        let sink = AmqpSink::new("amqp://127.0.0.1:5672/%2f", "cardiff");
        assert_eq!(sink.exceptions(), 0);
        assert_eq!(sink.last_exception(), 0);
    }

    #[test]
    fn internal_routing_keys_nest_scope_host_and_name() {
        let mut snapshot = Snapshot::default();
        snapshot.internal.incr(Scope::Controller, "host-a", "packets_received", 3);
        let key = format_internal_key("cardiff", COUNTER_PREFIX, "controller", "host-a", "packets_received");
        assert_eq!(key, "cardiff.internal.counters.controller.host-a.packets_received");
        assert_eq!(
            snapshot.internal.counters()[&(Scope::Controller, "host-a".to_string())]["packets_received"],
            3
        );
    }
}
