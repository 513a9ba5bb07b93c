//! Metric parsing, key normalization, live aggregation, and derived stats.

pub mod aggregator;
pub mod internal;
pub mod key;
pub mod parser;
pub mod stats;

pub use aggregator::{Aggregator, Snapshot};
pub use internal::{InternalTelemetry, Scope};
pub use parser::{parse_datagram, parse_line, MetricKind, ParsedSample};
