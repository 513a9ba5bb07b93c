//! Snapshot coordinator (component E).
//!
//! Drives the periodic flush: samples process resource usage, atomically
//! moves live aggregator state into a snapshot, fans the snapshot out to
//! every configured sink concurrently, and records delivery/snapshot
//! timing back into internal telemetry for the *next* flush to report.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::constants::{self, delivery_duration_metric, sink_exceptions_metric, sink_last_exception_metric};
use crate::error::StatsError;
use crate::metrics::internal::Scope;
use crate::metrics::Aggregator;
use crate::sinks::Sink;

/// Per-sink delivery is bounded to this fraction of the flush interval so a
/// single hung sink cannot push the barrier past the next tick.
const DELIVERY_TIMEOUT_FRACTION: f64 = 0.9;

pub struct Coordinator {
    aggregator: Arc<Mutex<Aggregator>>,
    sinks: Vec<Arc<dyn Sink>>,
    flush_interval: Duration,
}

impl Coordinator {
    pub fn new(aggregator: Arc<Mutex<Aggregator>>, sinks: Vec<Arc<dyn Sink>>, flush_interval_secs: u64) -> Self {
        Self {
            aggregator,
            sinks,
            flush_interval: Duration::from_secs(flush_interval_secs),
        }
    }

    /// Run the flush loop forever. Intended to be spawned as its own task.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.flush_once().await;
        }
    }

    /// Perform exactly one flush cycle: resource sampling, snapshot, and
    /// concurrent sink delivery. Public so integration tests can trigger a
    /// flush deterministically instead of waiting on the ticker.
    pub async fn flush_once(&self) {
        let start = Instant::now();
        let epoch_ts = current_epoch_secs();

        let snapshot = {
            let mut aggregator = self.aggregator.lock().await;
            sample_resource_usage(&mut aggregator);
            aggregator.snapshot(epoch_ts)
        };

        let flushed_at = chrono::DateTime::from_timestamp(epoch_ts, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| epoch_ts.to_string());
        debug!(
            "flushing snapshot at {flushed_at}: {} counters, {} gauges, {} sets, {} timers",
            snapshot.counters.len(),
            snapshot.gauges.len(),
            snapshot.sets.len(),
            snapshot.timers.len()
        );

        let snapshot_duration = start.elapsed();

        let per_sink_timeout = self.flush_interval.mul_f64(DELIVERY_TIMEOUT_FRACTION);
        let delivery_start = Instant::now();

        let deliveries = self.sinks.iter().map(|sink| {
            let sink = Arc::clone(sink);
            let snapshot = snapshot.clone();
            async move {
                let sink_start = Instant::now();
                let name = sink.name();
                match timeout(per_sink_timeout, sink.deliver(&snapshot)).await {
                    Ok(()) => debug!("delivered to {name} in {:?}", sink_start.elapsed()),
                    Err(_) => {
                        let error = StatsError::DeliveryTimeout { sink: name.to_string() };
                        warn!("{error} (limit {per_sink_timeout:?})");
                        // SinkTimeout is treated as SocketError for this sink's bookkeeping (§7).
                        sink.note_timeout();
                    }
                }
                (name, sink_start.elapsed())
            }
        });

        let durations = futures::future::join_all(deliveries).await;

        let mut aggregator = self.aggregator.lock().await;
        for (sink, (name, elapsed)) in self.sinks.iter().zip(durations) {
            // Lands in internal_timers[backend][host] for the *next* snapshot (§4.4.5).
            aggregator.record_duration_ms(
                Scope::Backend,
                &delivery_duration_metric(name),
                elapsed.as_secs_f64() * 1000.0,
            );
            // Per-sink transport-exception bookkeeping (§4.4, §7 SocketError).
            aggregator.set_backend_gauge(&sink_exceptions_metric(name), sink.exceptions() as i64);
            aggregator.set_backend_gauge(&sink_last_exception_metric(name), sink.last_exception());
        }
        aggregator.record_duration(Scope::Controller, constants::METRIC_DELIVERY_TIME, delivery_start);
        aggregator.record_duration_ms(
            Scope::Controller,
            constants::METRIC_SNAPSHOT_TIME,
            snapshot_duration.as_secs_f64() * 1000.0,
        );
    }
}

fn current_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Sample this process's resource usage via `getrusage(2)` and stash it as
/// internal gauges, the same fields the original's `add_resource_usage`
/// reports (max RSS converted to bytes on Linux, where the kernel reports
/// it in kilobytes).
fn sample_resource_usage(aggregator: &mut Aggregator) {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if result != 0 {
        warn!("failed to sample resource usage via getrusage(2)");
        return;
    }

    let cpu_user = usage.ru_utime.tv_sec as f64 + usage.ru_utime.tv_usec as f64 / 1_000_000.0;
    let cpu_system = usage.ru_stime.tv_sec as f64 + usage.ru_stime.tv_usec as f64 / 1_000_000.0;

    aggregator.set_resource_gauge("blocked_input", usage.ru_inblock as i64);
    aggregator.set_resource_gauge("blocked_output", usage.ru_oublock as i64);
    aggregator.set_resource_gauge("cpu_time_user", (cpu_user * 1000.0) as i64);
    aggregator.set_resource_gauge("cpu_time_system", (cpu_system * 1000.0) as i64);
    // Linux reports ru_maxrss in kilobytes; other platforms may report bytes directly.
    #[cfg(target_os = "linux")]
    let max_rss = usage.ru_maxrss * 1024;
    #[cfg(not(target_os = "linux"))]
    let max_rss = usage.ru_maxrss;
    aggregator.set_resource_gauge("memory_usage", max_rss as i64);
    aggregator.set_resource_gauge("forced_context_switches", usage.ru_nivcsw as i64);
}
