//! Wire format for the upstream merge protocol (component H/J shared).
//!
//! A framed payload terminated by [`crate::constants::FRAME_SENTINEL`]
//! (`0xCE`), chosen as the frame terminator the same way the original
//! reused AMQP's `FRAME_END` byte for its own pickle-framed stream.
//! Serialized with `rmp-serde` (MessagePack) rather than the original's
//! Python `pickle`, grounded in the `roboplc-metrics-exporter-scope` pack
//! member's wire-format choice -- a safe, cross-language-stable stand-in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::metrics::aggregator::{Counters, Sets, Timers};
use crate::metrics::internal::{InternalTelemetry, Scope};

/// Gauge values are sign-encoded as strings on the wire (`"+3"`, `"-1"`,
/// `"0"`), matching the original's `sign_gauges` helper: the receiving side
/// re-applies them through the ordinary gauge-apply path, which is how an
/// absolute value versus a signed delta is distinguished.
pub type SignedGauges = HashMap<String, String>;

/// `scope -> host -> name -> value`, mirroring the original's
/// `{metric_type: {host: {name: value}}}` nesting.
type NestedCounters = HashMap<String, HashMap<String, HashMap<String, i64>>>;
type NestedTimers = HashMap<String, HashMap<String, HashMap<String, Vec<f64>>>>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InternalPayload {
    pub counters: NestedCounters,
    pub gauges: NestedCounters,
    pub timers: NestedTimers,
}

impl InternalPayload {
    /// Flatten an `InternalTelemetry` snapshot into wire-nested form.
    pub fn from_telemetry(telemetry: &InternalTelemetry) -> Self {
        let mut payload = InternalPayload::default();
        for ((scope, host), names) in telemetry.counters() {
            let bucket = payload.counters.entry(scope.as_str().to_string()).or_default().entry(host.clone()).or_default();
            for (name, value) in names {
                bucket.insert(name.clone(), *value);
            }
        }
        for ((scope, host), names) in telemetry.gauges() {
            let bucket = payload.gauges.entry(scope.as_str().to_string()).or_default().entry(host.clone()).or_default();
            for (name, value) in names {
                bucket.insert(name.clone(), *value);
            }
        }
        for ((scope, host), names) in telemetry.timers() {
            let bucket = payload.timers.entry(scope.as_str().to_string()).or_default().entry(host.clone()).or_default();
            for (name, values) in names {
                bucket.insert(name.clone(), values.clone());
            }
        }
        payload
    }

    /// Merge this payload's entries into a live `InternalTelemetry`,
    /// additive the same way `merge_dicts` folds a peer's internal stats in.
    pub fn merge_into(&self, telemetry: &mut InternalTelemetry) {
        for (scope_str, hosts) in &self.counters {
            let scope = scope_from_str(scope_str);
            for (host, names) in hosts {
                for (name, value) in names {
                    telemetry.incr(scope, host, name, *value);
                }
            }
        }
        for (scope_str, hosts) in &self.gauges {
            let scope = scope_from_str(scope_str);
            for (host, names) in hosts {
                for (name, value) in names {
                    telemetry.set_gauge(scope, host, name, *value);
                }
            }
        }
        for (scope_str, hosts) in &self.timers {
            let scope = scope_from_str(scope_str);
            for (host, names) in hosts {
                for (name, values) in names {
                    for value in values {
                        telemetry.push_timer(scope, host, name, *value);
                    }
                }
            }
        }
    }
}

fn scope_from_str(scope: &str) -> Scope {
    match scope {
        "backend" => Scope::Backend,
        _ => Scope::Controller,
    }
}

/// The full snapshot handed between Cardiff peers over the upstream link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamPayload {
    pub host: String,
    pub counters: Counters,
    pub gauges: SignedGauges,
    pub sets: Sets,
    pub timers: Timers,
    pub internal: InternalPayload,
}

/// Serialize a payload and append the frame sentinel.
pub fn encode_frame(payload: &UpstreamPayload) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let mut bytes = rmp_serde::to_vec(payload)?;
    bytes.push(crate::constants::FRAME_SENTINEL);
    Ok(bytes)
}

/// Decode a single frame's payload bytes (sentinel already stripped).
pub fn decode_frame(bytes: &[u8]) -> Result<UpstreamPayload, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_msgpack() {
        let payload = UpstreamPayload {
            host: "edge-1".to_string(),
            counters: HashMap::from([("foo".to_string(), 10i64)]),
            gauges: HashMap::from([("g".to_string(), "+3".to_string())]),
            sets: HashMap::new(),
            timers: HashMap::from([("t".to_string(), vec![1.0, 2.0])]),
            internal: InternalPayload::default(),
        };

        let frame = encode_frame(&payload).unwrap();
        assert_eq!(*frame.last().unwrap(), crate::constants::FRAME_SENTINEL);

        let decoded = decode_frame(&frame[..frame.len() - 1]).unwrap();
        assert_eq!(decoded.host, "edge-1");
        assert_eq!(decoded.counters["foo"], 10);
        assert_eq!(decoded.timers["t"], vec![1.0, 2.0]);
    }

    #[test]
    fn internal_payload_round_trips_through_telemetry() {
        let mut telemetry = InternalTelemetry::new();
        telemetry.incr(Scope::Controller, "edge-1", "packets_received", 5);
        telemetry.push_timer(Scope::Backend, "edge-1", "delivery_time", 1.5);

        let payload = InternalPayload::from_telemetry(&telemetry);

        let mut merged = InternalTelemetry::new();
        payload.merge_into(&mut merged);

        assert_eq!(
            merged.counters()[&(Scope::Controller, "edge-1".to_string())]["packets_received"],
            5
        );
        assert_eq!(
            merged.timers()[&(Scope::Backend, "edge-1".to_string())]["delivery_time"],
            vec![1.5]
        );
    }
}
