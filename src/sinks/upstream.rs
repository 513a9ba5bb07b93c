//! Upstream sink: forwards this node's snapshot to a parent Cardiff
//! instance as one framed payload per flush, grounded in the original's
//! `UpstreamBackend`. Gauges are sign-encoded before going on the wire so
//! the parent's merge applies them as deltas, not absolute replacements.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::warn;

use crate::error::StatsError;
use crate::metrics::Snapshot;
use crate::net::protocol::{encode_frame, InternalPayload, UpstreamPayload};
use crate::sinks::{Sink, SinkHealth};

pub struct UpstreamSink {
    host: String,
    port: u16,
    local_host: String,
    health: SinkHealth,
}

impl UpstreamSink {
    pub fn new(host: impl Into<String>, port: u16, local_host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            local_host: local_host.into(),
            health: SinkHealth::new(),
        }
    }

    fn to_payload(&self, snapshot: &Snapshot) -> UpstreamPayload {
        UpstreamPayload {
            host: self.local_host.clone(),
            counters: snapshot.counters.clone(),
            gauges: sign_gauges(&snapshot.gauges),
            sets: snapshot.sets.clone(),
            timers: snapshot.timers.clone(),
            internal: InternalPayload::from_telemetry(&snapshot.internal),
        }
    }
}

/// Sign each gauge value the way `sign_gauges` does: `+N` / `-N` for
/// nonzero values, the literal `"0"` for zero (parsed as absolute on the
/// receiving side, since it carries no sign prefix).
fn sign_gauges(gauges: &crate::metrics::aggregator::Gauges) -> crate::net::protocol::SignedGauges {
    gauges
        .iter()
        .map(|(key, value)| {
            let signed = match value.cmp(&0) {
                std::cmp::Ordering::Less => format!("{value}"),
                std::cmp::Ordering::Greater => format!("+{value}"),
                std::cmp::Ordering::Equal => "0".to_string(),
            };
            (key.clone(), signed)
        })
        .collect()
}

#[async_trait]
impl Sink for UpstreamSink {
    fn name(&self) -> &'static str {
        "upstream"
    }

    async fn deliver(&self, snapshot: &Snapshot) {
        let payload = self.to_payload(snapshot);
        let frame = match encode_frame(&payload) {
            Ok(frame) => frame,
            Err(error) => {
                let error = StatsError::SerializationError(error.to_string());
                warn!("{error}");
                self.health.record_exception();
                return;
            }
        };

        let mut stream = match TcpStream::connect((self.host.as_str(), self.port)).await {
            Ok(stream) => stream,
            Err(error) => {
                let error = StatsError::DeliveryFailed {
                    sink: self.name().to_string(),
                    reason: format!("connect to {}:{}: {error}", self.host, self.port),
                };
                warn!("{error}");
                self.health.record_exception();
                return;
            }
        };

        if let Err(error) = stream.write_all(&frame).await {
            let error = StatsError::DeliveryFailed {
                sink: self.name().to_string(),
                reason: format!("send failed: {error}"),
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

    #[test]
    fn sign_gauges_encodes_sign_by_value() {
        let gauges = crate::metrics::aggregator::Gauges::from([
            ("pos".to_string(), 3i64),
            ("neg".to_string(), -3i64),
            ("zero".to_string(), 0i64),
        ]);
        let signed = sign_gauges(&gauges);
        assert_eq!(signed["pos"], "+3");
        assert_eq!(signed["neg"], "-3");
        assert_eq!(signed["zero"], "0");
    }

    #[test]
    fn health_starts_clean() {
        let sink = UpstreamSink::new("127.0.0.1", 8127, "host-a");
        assert_eq!(sink.exceptions(), 0);
        assert_eq!(sink.last_exception(), 0);
    }
}
