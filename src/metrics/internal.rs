//! Self-telemetry state (component F).
//!
//! The Python original nests internal metrics as `{scope: {host: {name:
//! value}}}` purely so that merging a remote peer's internal metrics can
//! never clobber the local host's own entries. We keep that safety property
//! but index with a plain `(Scope, host)` composite key instead of a chain of
//! dynamic maps, per the redesign notes.

use std::collections::HashMap;

/// Which half of the pipeline an internal metric describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Controller,
    Backend,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Controller => "controller",
            Scope::Backend => "backend",
        }
    }
}

type ScopeHost = (Scope, String);

/// Internal counters/gauges/timers for one flush interval, scoped per host so
/// that merging a peer's internal telemetry is always additive rather than
/// destructive.
#[derive(Debug, Default, Clone)]
pub struct InternalTelemetry {
    counters: HashMap<ScopeHost, HashMap<String, i64>>,
    gauges: HashMap<ScopeHost, HashMap<String, i64>>,
    timers: HashMap<ScopeHost, HashMap<String, Vec<f64>>>,
}

impl InternalTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&mut self, scope: Scope, host: &str, name: &str, value: i64) {
        let bucket = self
            .counters
            .entry((scope, host.to_string()))
            .or_default();
        *bucket.entry(name.to_string()).or_insert(0) += value;
    }

    pub fn set_gauge(&mut self, scope: Scope, host: &str, name: &str, value: i64) {
        let bucket = self.gauges.entry((scope, host.to_string())).or_default();
        bucket.insert(name.to_string(), value);
    }

    pub fn push_timer(&mut self, scope: Scope, host: &str, name: &str, value_ms: f64) {
        let bucket = self.timers.entry((scope, host.to_string())).or_default();
        bucket.entry(name.to_string()).or_default().push(value_ms);
    }

    /// Append a duration (in milliseconds) measured since `start` to an
    /// internal timer, the way `internal_timer(key, start_time)` does in the
    /// original controller.
    pub fn record_duration_since(
        &mut self,
        scope: Scope,
        host: &str,
        name: &str,
        start: std::time::Instant,
    ) {
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.push_timer(scope, host, name, elapsed_ms);
    }

    /// Move all accumulated state out, replacing it with an empty scaffold.
    pub fn drain(&mut self) -> InternalTelemetry {
        std::mem::take(self)
    }

    pub fn counters(&self) -> &HashMap<ScopeHost, HashMap<String, i64>> {
        &self.counters
    }

    pub fn gauges(&self) -> &HashMap<ScopeHost, HashMap<String, i64>> {
        &self.gauges
    }

    pub fn timers(&self) -> &HashMap<ScopeHost, HashMap<String, Vec<f64>>> {
        &self.timers
    }

    /// Deep-union another telemetry snapshot into this one, remote wins on
    /// leaf values for counters/gauges (last writer wins, same as the
    /// original's `merge_dicts`), timers extend rather than overwrite.
    pub fn merge_from(&mut self, other: &InternalTelemetry) {
        for (key, names) in &other.counters {
            let bucket = self.counters.entry(key.clone()).or_default();
            for (name, value) in names {
                bucket.insert(name.clone(), *value);
            }
        }
        for (key, names) in &other.gauges {
            let bucket = self.gauges.entry(key.clone()).or_default();
            for (name, value) in names {
                bucket.insert(name.clone(), *value);
            }
        }
        for (key, names) in &other.timers {
            let bucket = self.timers.entry(key.clone()).or_default();
            for (name, values) in names {
                bucket.entry(name.clone()).or_default().extend(values.iter().copied());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_accumulates_per_host() {
        let mut tel = InternalTelemetry::new();
        tel.incr(Scope::Controller, "host-a", "packets_received", 1);
        tel.incr(Scope::Controller, "host-a", "packets_received", 1);
        tel.incr(Scope::Controller, "host-b", "packets_received", 1);

        let a = tel.counters()[&(Scope::Controller, "host-a".to_string())]
            .get("packets_received")
            .copied();
        let b = tel.counters()[&(Scope::Controller, "host-b".to_string())]
            .get("packets_received")
            .copied();
        assert_eq!(a, Some(2));
        assert_eq!(b, Some(1));
    }

    #[test]
    fn drain_resets_to_empty_scaffold() {
        let mut tel = InternalTelemetry::new();
        tel.incr(Scope::Controller, "host-a", "bad_lines_seen", 1);
        let drained = tel.drain();
        assert!(!drained.counters().is_empty());
        assert!(tel.counters().is_empty());
        assert!(tel.gauges().is_empty());
        assert!(tel.timers().is_empty());
    }

    #[test]
    fn merge_from_is_additive_across_hosts() {
        let mut local = InternalTelemetry::new();
        local.incr(Scope::Controller, "local", "packets_received", 5);

        let mut remote = InternalTelemetry::new();
        remote.incr(Scope::Controller, "remote", "packets_received", 3);

        local.merge_from(&remote);
        assert_eq!(
            local.counters()[&(Scope::Controller, "local".to_string())]["packets_received"],
            5
        );
        assert_eq!(
            local.counters()[&(Scope::Controller, "remote".to_string())]["packets_received"],
            3
        );
    }

    #[test]
    fn merge_from_extends_timers_rather_than_overwriting() {
        let mut local = InternalTelemetry::new();
        local.push_timer(Scope::Backend, "h", "delivery_time", 1.0);

        let mut remote = InternalTelemetry::new();
        remote.push_timer(Scope::Backend, "h", "delivery_time", 2.0);

        local.merge_from(&remote);
        let values = &local.timers()[&(Scope::Backend, "h".to_string())]["delivery_time"];
        assert_eq!(values, &vec![1.0, 2.0]);
    }
}
