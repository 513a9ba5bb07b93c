//! Upstream TCP merge server (component H).
//!
//! Accepts connections from downstream Cardiff peers. Each connection
//! carries exactly one payload, terminated by
//! [`crate::constants::FRAME_SENTINEL`]: the server reads up to the
//! sentinel, merges the decoded frame into the shared live aggregator
//! state, then closes the stream. A peer that wants to send another
//! payload opens a new connection.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::constants::FRAME_SENTINEL;
use crate::error::{NetworkError, Result};
use crate::metrics::internal::Scope;
use crate::metrics::Aggregator;
use crate::net::protocol::decode_frame;

/// Bind the upstream TCP listener. Failure here is fatal at startup.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr).await.map_err(|e| {
        NetworkError::BindFailed {
            addr: addr.clone(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Accept connections until the listener errors out. Each connection is
/// handled on its own spawned task.
pub async fn run(listener: TcpListener, aggregator: Arc<Mutex<Aggregator>>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!("upstream server: accept failed: {error}");
                continue;
            }
        };
        debug!("upstream server: accepted connection from {peer}");

        let aggregator = Arc::clone(&aggregator);
        tokio::spawn(async move {
            handle_connection(stream, aggregator).await;
        });
    }
}

/// One payload per connection: read up to the frame sentinel, merge it, and
/// close the stream. A peer that wants to send another payload opens a new
/// connection for it.
async fn handle_connection(mut stream: TcpStream, aggregator: Arc<Mutex<Aggregator>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let frame_bytes = loop {
        if let Some(pos) = buf.iter().position(|b| *b == FRAME_SENTINEL) {
            break buf.drain(..=pos).collect::<Vec<u8>>();
        }

        match stream.read(&mut chunk).await {
            Ok(0) => {
                if !buf.is_empty() {
                    warn!("upstream server: connection closed mid-frame, dropping partial payload");
                }
                return;
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(error) => {
                warn!("upstream server: read failed: {error}");
                return;
            }
        }
    };

    let payload_bytes = &frame_bytes[..frame_bytes.len() - 1];
    let start = Instant::now();
    match decode_frame(payload_bytes) {
        Ok(payload) => {
            let mut aggregator = aggregator.lock().await;
            aggregator.note_downstream_payload();
            aggregator.merge_counters(&payload.counters);
            aggregator.merge_gauges_signed(&payload.gauges);
            aggregator.merge_sets(&payload.sets);
            aggregator.merge_timers(&payload.timers);
            let mut internal = crate::metrics::internal::InternalTelemetry::new();
            payload.internal.merge_into(&mut internal);
            aggregator.merge_internal(&internal);
            for _ in 0..(payload.counters.len() + payload.gauges.len() + payload.sets.len() + payload.timers.len()) {
                aggregator.note_downstream_packet();
            }
            aggregator.record_duration(Scope::Controller, crate::constants::METRIC_PROCESSING_TIME, start);
        }
        Err(error) => {
            warn!("upstream server: failed to decode frame: {error}");
        }
    }

    let _ = stream.shutdown().await;
}
