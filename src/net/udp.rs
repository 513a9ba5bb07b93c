//! UDP statsd ingest (component G).
//!
//! Binds once at startup and loops `recv_from` for the lifetime of the
//! process; each datagram may carry multiple newline-separated lines
//! (component B handles the split). A malformed line bumps
//! `bad_lines_seen` and is otherwise ignored -- it never aborts the rest of
//! the datagram.

use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::constants::UDP_RECV_BUFFER_SIZE;
use crate::error::{NetworkError, Result};
use crate::metrics::{parse_datagram, Aggregator};

/// Bind the UDP ingest socket. Failure here is fatal at startup.
pub async fn bind(host: &str, port: u16) -> Result<UdpSocket> {
    let addr = format!("{host}:{port}");
    UdpSocket::bind(&addr).await.map_err(|e| {
        NetworkError::BindFailed {
            addr: addr.clone(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Run the ingest loop until the socket errors out or the task is aborted.
/// Intended to be spawned as its own Tokio task.
pub async fn run(socket: UdpSocket, aggregator: Arc<Mutex<Aggregator>>) {
    let mut buf = vec![0u8; UDP_RECV_BUFFER_SIZE];
    loop {
        let (len, _peer) = match socket.recv_from(&mut buf).await {
            Ok(result) => result,
            Err(error) => {
                warn!("udp ingest: recv_from failed: {error}");
                continue;
            }
        };

        let start = Instant::now();
        let results = parse_datagram(&buf[..len]);

        let mut aggregator = aggregator.lock().await;
        aggregator.note_packet_received();
        for result in results {
            match result {
                Ok(sample) => aggregator.apply_sample(&sample),
                Err(error) => {
                    debug!("udp ingest: dropping malformed line: {error}");
                    aggregator.note_bad_line();
                }
            }
        }
        aggregator.record_processing_time(start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_succeeds_on_ephemeral_port() {
        let socket = bind("127.0.0.1", 0).await.unwrap();
        assert!(socket.local_addr().unwrap().port() > 0);
    }

    #[tokio::test]
    async fn bind_reports_network_error_on_invalid_host() {
        let result = bind("not-a-valid-host", 12345).await;
        assert!(result.is_err());
    }
}
