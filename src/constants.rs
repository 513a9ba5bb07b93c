//! Crate-wide default values, grouped the way configuration defaults are
//! grouped rather than scattered as magic numbers through the modules that
//! use them.

pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_STATSD_HOST: &str = "0.0.0.0";
pub const DEFAULT_STATSD_PORT: u16 = 8125;
pub const DEFAULT_UPSTREAM_HOST: &str = "0.0.0.0";
pub const DEFAULT_UPSTREAM_PORT: u16 = 8127;
pub const DEFAULT_CONFIG_FILE: &str = "cardiff.yaml";

pub const DEFAULT_METRIC_PREFIX: &str = "cardiff";
pub const COUNTER_PREFIX: &str = "counters";
pub const GAUGE_PREFIX: &str = "gauges";
pub const SET_PREFIX: &str = "sets";
pub const TIMER_PREFIX: &str = "timers";
pub const INTERNAL_PREFIX: &str = "internal";

pub const DEFAULT_GRAPHITE_PLAINTEXT_PORT: u16 = 2003;
pub const DEFAULT_GRAPHITE_PICKLE_PORT: u16 = 2004;
pub const GRAPHITE_PICKLE_BATCH_SIZE: usize = 300;

/// Upstream TCP frame terminator, borrowed from AMQP's frame-end byte.
pub const FRAME_SENTINEL: u8 = 0xCE;

/// Max datagram size read per UDP `recv_from` call.
pub const UDP_RECV_BUFFER_SIZE: usize = 8192;

// Internal self-telemetry metric names, kept as constants rather than
// inlined string literals since both the aggregator and the upstream merge
// path reference the exact same names.
pub const METRIC_BAD_LINES_SEEN: &str = "bad_lines_seen";
pub const METRIC_PACKETS_RECEIVED: &str = "packets_received";
pub const METRIC_PROCESSING_TIME: &str = "processing_time";
pub const METRIC_SNAPSHOT_TIME: &str = "snapshot_time";
pub const METRIC_DELIVERY_TIME: &str = "delivery_time";
pub const METRIC_DOWNSTREAM_PACKETS_RECEIVED: &str = "downstream_packets_received";
pub const METRIC_DOWNSTREAM_PAYLOADS_RECEIVED: &str = "downstream_payloads_received";
pub const METRIC_COUNTERS_APPLIED: &str = "counters";
pub const METRIC_GAUGES_APPLIED: &str = "gauges";
pub const METRIC_SETS_APPLIED: &str = "sets";
pub const METRIC_TIMERS_APPLIED: &str = "timers";

/// Formats the per-sink delivery duration internal timer name, e.g.
/// `delivery.graphite.duration_ms`.
pub fn delivery_duration_metric(sink_name: &str) -> String {
    format!("delivery.{sink_name}.duration_ms")
}

/// Formats the per-sink cumulative exceptions internal gauge name, e.g.
/// `graphite.exceptions`.
pub fn sink_exceptions_metric(sink_name: &str) -> String {
    format!("{sink_name}.exceptions")
}

/// Formats the per-sink last-exception-epoch internal gauge name, e.g.
/// `graphite.last_exception`.
pub fn sink_last_exception_metric(sink_name: &str) -> String {
    format!("{sink_name}.last_exception")
}
