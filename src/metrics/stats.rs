//! Derived statistics over a snapshot's timer and set buckets (component D).
//!
//! `percentile` uses linear interpolation on the sorted sample, the same
//! formula the original's `percentile()` helper implements: `k = (n-1) * p`,
//! value interpolated between the floor and ceiling indices.

use std::collections::HashMap;

/// Summary statistics for one timer bucket over a flush interval.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerStats {
    pub count: usize,
    pub count_ps: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub total: f64,
    pub median: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Summary statistics for one set bucket over a flush interval.
#[derive(Debug, Clone, PartialEq)]
pub struct SetStats {
    pub count: usize,
    pub count_ps: f64,
    pub histogram: HashMap<String, u64>,
}

/// Linear-interpolation percentile over an already-sorted slice, `p` in `[0, 1]`.
///
/// Returns `0.0` for an empty slice, matching the original's guard against
/// dividing by zero when a timer key has no samples left after a flush.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (sorted.len() - 1) as f64 * p;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Compute `TimerStats` for one bucket's raw (unsorted) sample vector.
/// `flush_interval_secs` must be > 0; callers guarantee this from config validation.
pub fn timer_stats(values: &[f64], flush_interval_secs: f64) -> TimerStats {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = sorted.len();
    let total: f64 = sorted.iter().sum();
    let mean = if count > 0 { total / count as f64 } else { 0.0 };

    TimerStats {
        count,
        count_ps: count as f64 / flush_interval_secs,
        min: sorted.first().copied().unwrap_or(0.0),
        max: sorted.last().copied().unwrap_or(0.0),
        mean,
        total,
        median: percentile(&sorted, 0.5),
        p90: percentile(&sorted, 0.9),
        p95: percentile(&sorted, 0.95),
    }
}

/// Compute `SetStats` for one bucket's value -> occurrence-count map.
///
/// The histogram is handed back as-is: the original's `set_values` sorts the
/// unique-value list before building the histogram, but since the histogram
/// is keyed by value anyway the sort has no observable effect and is not
/// reproduced here.
pub fn set_stats(occurrences: &HashMap<String, u64>, flush_interval_secs: f64) -> SetStats {
    SetStats {
        count: occurrences.len(),
        count_ps: occurrences.len() as f64 / flush_interval_secs,
        histogram: occurrences.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_matches_linear_interpolation() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 1.0), 5.0);
        assert_eq!(percentile(&sorted, 0.5), 3.0);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted = vec![10.0, 20.0, 30.0, 40.0];
        // rank = 3 * 0.9 = 2.7 -> interpolate between index 2 (30) and 3 (40)
        let got = percentile(&sorted, 0.9);
        assert!((got - 37.0).abs() < 1e-9, "got {got}");
    }

    #[test]
    fn percentile_empty_is_zero() {
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn percentile_single_value() {
        assert_eq!(percentile(&[42.0], 0.95), 42.0);
    }

    #[test]
    fn timer_stats_scenario_5() {
        let values = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        let stats = timer_stats(&values, 10.0);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.count_ps, 0.5);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 50.0);
        assert_eq!(stats.mean, 30.0);
        assert_eq!(stats.total, 150.0);
        assert_eq!(stats.median, 30.0);
    }

    #[test]
    fn timer_stats_empty_bucket() {
        let stats = timer_stats(&[], 10.0);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.mean, 0.0);
    }

    #[test]
    fn set_stats_reports_unique_count_and_histogram() {
        let occurrences = HashMap::from([("a".to_string(), 2u64), ("b".to_string(), 1u64)]);
        let stats = set_stats(&occurrences, 10.0);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.count_ps, 0.2);
        assert_eq!(stats.histogram["a"], 2);
        assert_eq!(stats.histogram["b"], 1);
    }
}
