//! Live aggregation state (component C) and the snapshot it produces.
//!
//! This struct owns both the public metric maps and the self-telemetry
//! (component F), the same coupling the original controller uses: every
//! `apply_*` call also bumps the matching internal counter.

use std::collections::HashMap;
use std::time::Instant;

use crate::constants;
use crate::metrics::internal::{InternalTelemetry, Scope};
use crate::metrics::parser::{MetricKind, ParsedSample};

pub type Counters = HashMap<String, i64>;
pub type Gauges = HashMap<String, i64>;
pub type Sets = HashMap<String, HashMap<String, u64>>;
pub type Timers = HashMap<String, Vec<f64>>;

/// A complete, moved-out copy of live metric state for exactly one flush
/// interval, owned exclusively by the coordinator until handed to sinks.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub epoch_ts: i64,
    pub counters: Counters,
    pub gauges: Gauges,
    pub sets: Sets,
    pub timers: Timers,
    pub internal: InternalTelemetry,
}

/// Live in-memory aggregation state for counters, gauges, sets, and timers,
/// plus the self-telemetry describing the aggregator's own operation.
pub struct Aggregator {
    host: String,
    counters: Counters,
    gauges: Gauges,
    sets: Sets,
    timers: Timers,
    internal: InternalTelemetry,
}

impl Aggregator {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            counters: Counters::new(),
            gauges: Gauges::new(),
            sets: Sets::new(),
            timers: Timers::new(),
            internal: InternalTelemetry::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Apply one decoded sample, dispatching on its kind. Bumps the
    /// corresponding internal per-kind counter.
    pub fn apply_sample(&mut self, sample: &ParsedSample) {
        match sample.kind {
            MetricKind::Counter => self.apply_counter(&sample.key, &sample.value, sample.sample_rate),
            MetricKind::Gauge => self.apply_gauge(&sample.key, &sample.value),
            MetricKind::Set => self.apply_set(&sample.key, &sample.value),
            MetricKind::Timer => self.apply_timer(&sample.key, &sample.value, sample.sample_rate),
        }
    }

    /// `counters[key] += int(value) * (1/rate)`.
    pub fn apply_counter(&mut self, key: &str, value: &str, rate: f64) {
        let parsed = parse_numeric(value).trunc();
        let rate = if rate > 0.0 { rate } else { 1.0 };
        let delta = (parsed * (1.0 / rate)).round() as i64;
        *self.counters.entry(key.to_string()).or_insert(0) += delta;
        self.internal
            .incr(Scope::Controller, &self.host, constants::METRIC_COUNTERS_APPLIED, 1);
    }

    /// Absolute replacement, unless `value` carries a leading sign, in which
    /// case it is a delta against the current value (treated as `0` if the
    /// key is new).
    pub fn apply_gauge(&mut self, key: &str, value: &str) {
        let signed = value.starts_with('+') || value.starts_with('-');
        let entry = self.gauges.entry(key.to_string()).or_insert(0);
        if signed {
            *entry += parse_numeric(value).trunc() as i64;
        } else {
            *entry = parse_numeric(value).trunc() as i64;
        }
        self.internal
            .incr(Scope::Controller, &self.host, constants::METRIC_GAUGES_APPLIED, 1);
    }

    /// `sets[key][value] += 1`.
    pub fn apply_set(&mut self, key: &str, value: &str) {
        let bucket = self.sets.entry(key.to_string()).or_default();
        *bucket.entry(value.to_string()).or_insert(0) += 1;
        self.internal
            .incr(Scope::Controller, &self.host, constants::METRIC_SETS_APPLIED, 1);
    }

    /// Append `value` to `timers[key]` exactly `max(1, trunc(sample_size))`
    /// times. Since `sample_size` here is the statsd `@RATE` value (always
    /// in `(0, 1]` unless omitted), this collapses to exactly one append in
    /// practice -- a fidelity quirk of the original inherited deliberately.
    pub fn apply_timer(&mut self, key: &str, value: &str, sample_size: f64) {
        let times = (sample_size.trunc() as i64).max(1);
        let v = parse_numeric(value);
        let bucket = self.timers.entry(key.to_string()).or_default();
        for _ in 0..times {
            bucket.push(v);
        }
        self.internal
            .incr(Scope::Controller, &self.host, constants::METRIC_TIMERS_APPLIED, 1);
    }

    pub fn note_bad_line(&mut self) {
        self.internal
            .incr(Scope::Controller, &self.host, constants::METRIC_BAD_LINES_SEEN, 1);
    }

    pub fn note_packet_received(&mut self) {
        self.internal
            .incr(Scope::Controller, &self.host, constants::METRIC_PACKETS_RECEIVED, 1);
    }

    pub fn note_downstream_payload(&mut self) {
        self.internal.incr(
            Scope::Controller,
            &self.host,
            constants::METRIC_DOWNSTREAM_PAYLOADS_RECEIVED,
            1,
        );
    }

    pub fn note_downstream_packet(&mut self) {
        self.internal.incr(
            Scope::Controller,
            &self.host,
            constants::METRIC_DOWNSTREAM_PACKETS_RECEIVED,
            1,
        );
    }

    pub fn record_processing_time(&mut self, start: Instant) {
        self.internal
            .record_duration_since(Scope::Controller, &self.host, constants::METRIC_PROCESSING_TIME, start);
    }

    pub fn record_duration(&mut self, scope: Scope, name: &str, start: Instant) {
        self.internal.record_duration_since(scope, &self.host, name, start);
    }

    pub fn record_duration_ms(&mut self, scope: Scope, name: &str, duration_ms: f64) {
        self.internal.push_timer(scope, &self.host, name, duration_ms);
    }

    pub fn set_resource_gauge(&mut self, name: &str, value: i64) {
        self.internal.set_gauge(Scope::Controller, &self.host, name, value);
    }

    /// Record a `Scope::Backend` gauge under the local host, used for
    /// per-sink health bookkeeping (`<sink>.exceptions`, `<sink>.last_exception`).
    pub fn set_backend_gauge(&mut self, name: &str, value: i64) {
        self.internal.set_gauge(Scope::Backend, &self.host, name, value);
    }

    /// Merge another set of raw maps into live state, one `apply_counter`
    /// per key (rate fixed at 1), the same path `downstream_data` routes
    /// through in the original for every remote counter key.
    pub fn merge_counters(&mut self, counters: &Counters) {
        for (key, value) in counters {
            self.apply_counter(key, &value.to_string(), 1.0);
        }
    }

    pub fn merge_gauges_signed(&mut self, gauges: &HashMap<String, String>) {
        for (key, signed_value) in gauges {
            self.apply_gauge(key, signed_value);
        }
    }

    pub fn merge_sets(&mut self, sets: &Sets) {
        for (key, occurrences) in sets {
            for (value, count) in occurrences {
                let bucket = self.sets.entry(key.clone()).or_default();
                *bucket.entry(value.clone()).or_insert(0) += count;
                self.internal
                    .incr(Scope::Controller, &self.host, constants::METRIC_SETS_APPLIED, 1);
            }
        }
    }

    pub fn merge_timers(&mut self, timers: &Timers) {
        for (key, values) in timers {
            self.timers.entry(key.clone()).or_default().extend(values.iter().copied());
            self.internal.incr(
                Scope::Controller,
                &self.host,
                constants::METRIC_TIMERS_APPLIED,
                values.len() as i64,
            );
        }
    }

    pub fn merge_internal(&mut self, internal: &InternalTelemetry) {
        self.internal.merge_from(internal);
    }

    /// Atomically move live state out into a snapshot and reset all maps to
    /// empty. `epoch_ts` is the integer seconds-since-epoch at snapshot time.
    pub fn snapshot(&mut self, epoch_ts: i64) -> Snapshot {
        Snapshot {
            epoch_ts,
            counters: std::mem::take(&mut self.counters),
            gauges: std::mem::take(&mut self.gauges),
            sets: std::mem::take(&mut self.sets),
            timers: std::mem::take(&mut self.timers),
            internal: self.internal.drain(),
        }
    }

    /// Read-only view of live counters, exposed for tests and diagnostics --
    /// delivery always goes through `snapshot()`, never this accessor.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn gauges(&self) -> &Gauges {
        &self.gauges
    }

    pub fn sets(&self) -> &Sets {
        &self.sets
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }
}

/// Best-effort numeric parse matching Python's forgiving `int()`/`float()`
/// coercion at this boundary: malformed values degrade to `0` rather than
/// aborting ingest, since UDP samples are never retried anyway.
fn parse_numeric(value: &str) -> f64 {
    value.parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_linearity_scenario_1() {
        let mut agg = Aggregator::new("host");
        agg.apply_counter("foo", "5", 1.0);
        agg.apply_counter("foo", "3", 1.0);
        assert_eq!(agg.counters()["foo"], 8);
    }

    #[test]
    fn counter_sample_rate_scenario_2() {
        let mut agg = Aggregator::new("host");
        agg.apply_counter("foo", "10", 0.5);
        assert_eq!(agg.counters()["foo"], 20);
    }

    #[test]
    fn gauge_absolute_and_signed_scenario_3() {
        let mut agg = Aggregator::new("host");
        agg.apply_gauge("g1", "10");
        agg.apply_gauge("g1", "+3");
        agg.apply_gauge("g1", "-1");
        assert_eq!(agg.gauges()["g1"], 12);
    }

    #[test]
    fn gauge_signed_without_prior_value_scenario_4() {
        let mut agg = Aggregator::new("host");
        agg.apply_gauge("g2", "+4");
        assert_eq!(agg.gauges()["g2"], 4);
    }

    #[test]
    fn set_counts_occurrences_scenario_6() {
        let mut agg = Aggregator::new("host");
        agg.apply_set("s1", "a");
        agg.apply_set("s1", "a");
        agg.apply_set("s1", "b");
        assert_eq!(agg.sets()["s1"]["a"], 2);
        assert_eq!(agg.sets()["s1"]["b"], 1);
        assert_eq!(agg.sets()["s1"].len(), 2);
    }

    #[test]
    fn timer_appends_each_sample() {
        let mut agg = Aggregator::new("host");
        agg.apply_timer("t", "100", 1.0);
        agg.apply_timer("t", "200", 1.0);
        agg.apply_timer("t", "300", 1.0);
        assert_eq!(agg.timers()["t"], vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn timer_with_fractional_sample_size_still_appends_once() {
        let mut agg = Aggregator::new("host");
        agg.apply_timer("t", "100", 0.1);
        assert_eq!(agg.timers()["t"], vec![100.0]);
    }

    #[test]
    fn snapshot_reset_invariant() {
        let mut agg = Aggregator::new("host");
        agg.apply_counter("foo", "1", 1.0);
        agg.apply_gauge("g", "1");
        agg.apply_set("s", "x");
        agg.apply_timer("t", "1", 1.0);

        let snap = agg.snapshot(1234);
        assert_eq!(snap.counters["foo"], 1);
        assert!(agg.counters().is_empty());
        assert!(agg.gauges().is_empty());
        assert!(agg.sets().is_empty());
        assert!(agg.timers().is_empty());
    }

    #[test]
    fn key_normalization_applies_through_apply_sample() {
        use crate::metrics::parser::parse_line;
        let mut agg = Aggregator::new("host");
        let sample = parse_line("a b/c:1|c").unwrap();
        agg.apply_sample(&sample);
        assert!(agg.counters().contains_key("a_b-c"));
    }

    #[test]
    fn merge_counters_is_commutative_scenario_8() {
        let mut a = Aggregator::new("host");
        a.merge_counters(&HashMap::from([("x".to_string(), 7)]));
        a.apply_counter("x", "3", 1.0);

        let mut b = Aggregator::new("host");
        b.apply_counter("x", "3", 1.0);
        b.merge_counters(&HashMap::from([("x".to_string(), 7)]));

        assert_eq!(a.counters()["x"], 10);
        assert_eq!(b.counters()["x"], 10);
        assert_eq!(a.counters()["x"], b.counters()["x"]);
    }
}
