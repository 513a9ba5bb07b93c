//! Statsd line parser (component B).
//!
//! Grammar per line: `KEY ":" VALUE "|" KIND [ "|@" RATE ]`. A malformed line
//! never invalidates the rest of a multi-line datagram — each line is parsed
//! independently and failures are reported per-line to the caller, which is
//! responsible for bumping `bad_lines_seen`.

use crate::error::ParseError;
use crate::metrics::key;

/// The closed set of metric kinds statsd lines can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Set,
    Timer,
}

impl MetricKind {
    fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "c" => Some(MetricKind::Counter),
            "g" => Some(MetricKind::Gauge),
            "s" => Some(MetricKind::Set),
            "ms" => Some(MetricKind::Timer),
            _ => None,
        }
    }
}

/// A single parsed sample, ready for the aggregator.
///
/// `value` stays stringly-typed at this boundary because gauges carry their
/// sign (`+`/`-`) as part of the sample text, not as a separate flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSample {
    pub key: String,
    pub value: String,
    pub kind: MetricKind,
    pub sample_rate: f64,
}

/// Parse a single statsd line (no embedded newlines).
pub fn parse_line(line: &str) -> Result<ParsedSample, ParseError> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
        return Err(ParseError::EmptyLine);
    }

    let parts: Vec<&str> = line.split('|').collect();
    if parts.is_empty() {
        return Err(ParseError::EmptyLine);
    }

    let mut bits = parts[0].splitn(2, ':');
    let raw_key = bits.next().unwrap_or_default();
    let key = key::normalize(raw_key);
    let value = match bits.next() {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "1".to_string(),
    };

    let kind_str = parts.get(1).copied().unwrap_or("");
    let kind = MetricKind::from_wire(kind_str)
        .ok_or_else(|| ParseError::UnknownKind(kind_str.to_string()))?;

    let sample_rate = match parts.get(2) {
        None => 1.0,
        Some(rate_part) => {
            let rate_str = rate_part
                .strip_prefix('@')
                .ok_or_else(|| ParseError::InvalidSampleRate(rate_part.to_string()))?;
            let rate: f64 = rate_str
                .parse()
                .map_err(|_| ParseError::InvalidSampleRate(rate_part.to_string()))?;
            if rate <= 0.0 || rate > 1.0 {
                return Err(ParseError::InvalidSampleRate(rate_part.to_string()));
            }
            rate
        }
    };

    Ok(ParsedSample {
        key,
        value,
        kind,
        sample_rate,
    })
}

/// Parse a raw UDP datagram, which may contain one or more newline-separated
/// lines. Returns one `Result` per non-empty line; the caller decides how to
/// account for failures (bumping `bad_lines_seen`) and successes.
pub fn parse_datagram(data: &[u8]) -> Vec<Result<ParsedSample, ParseError>> {
    let text = String::from_utf8_lossy(data);
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_counter() {
        let sample = parse_line("foo:5|c").unwrap();
        assert_eq!(sample.key, "foo");
        assert_eq!(sample.value, "5");
        assert_eq!(sample.kind, MetricKind::Counter);
        assert_eq!(sample.sample_rate, 1.0);
    }

    #[test]
    fn parses_counter_with_sample_rate() {
        let sample = parse_line("foo:10|c|@0.5").unwrap();
        assert_eq!(sample.sample_rate, 0.5);
    }

    #[test]
    fn missing_value_defaults_to_one() {
        let sample = parse_line("foo|c").unwrap();
        assert_eq!(sample.value, "1");
    }

    #[test]
    fn parses_gauge_with_sign_preserved_in_value() {
        let sample = parse_line("g1:+3|g").unwrap();
        assert_eq!(sample.value, "+3");
        assert_eq!(sample.kind, MetricKind::Gauge);
    }

    #[test]
    fn parses_timer_and_set() {
        assert_eq!(parse_line("t:100|ms").unwrap().kind, MetricKind::Timer);
        assert_eq!(parse_line("s1:a|s").unwrap().kind, MetricKind::Set);
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = parse_line("foo:1|xyz").unwrap_err();
        assert_eq!(err, ParseError::UnknownKind("xyz".to_string()));
    }

    #[test]
    fn rejects_malformed_sample_rate() {
        assert!(parse_line("foo:1|c|@bogus").is_err());
        assert!(parse_line("foo:1|c|@0").is_err());
        assert!(parse_line("foo:1|c|@1.5").is_err());
    }

    #[test]
    fn normalizes_key_during_parse() {
        let sample = parse_line("a b/c:1|c").unwrap();
        assert_eq!(sample.key, "a_b-c");
    }

    #[test]
    fn multiline_datagram_is_independent_per_line() {
        let results = parse_datagram(b"foo:5|c\nbad line garbage\nbar:1|g");
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn empty_datagram_yields_no_results() {
        assert!(parse_datagram(b"").is_empty());
        assert!(parse_datagram(b"\n\n").is_empty());
    }
}
