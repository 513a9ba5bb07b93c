//! Network ingest: UDP statsd ingest and the upstream TCP merge server.

pub mod protocol;
pub mod udp;
pub mod upstream_server;
