//! Integration tests exercising the real UDP ingest path and the upstream
//! TCP merge path end-to-end, including the frame-sentinel codec.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;

use cardiff::metrics::aggregator::{Counters, Sets, Timers};
use cardiff::metrics::internal::InternalTelemetry;
use cardiff::metrics::Aggregator;
use cardiff::net::protocol::{encode_frame, InternalPayload, UpstreamPayload};
use cardiff::net::{udp, upstream_server};

#[tokio::test]
async fn udp_ingest_applies_datagram_into_shared_aggregator() {
    let socket = udp::bind("127.0.0.1", 0).await.unwrap();
    let addr = socket.local_addr().unwrap();
    let aggregator = Arc::new(Mutex::new(Aggregator::new("test-host")));

    let agg_for_task = Arc::clone(&aggregator);
    let handle = tokio::spawn(async move {
        udp::run(socket, agg_for_task).await;
    });

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"hits:3|c\nhits:2|c", addr).await.unwrap();

    // give the ingest task a moment to process the datagram
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    let agg = aggregator.lock().await;
    assert_eq!(agg.counters()["hits"], 5);
}

#[tokio::test]
async fn upstream_merge_applies_remote_snapshot_additively() {
    let listener = upstream_server::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let aggregator = Arc::new(Mutex::new(Aggregator::new("central")));

    {
        let mut agg = aggregator.lock().await;
        agg.apply_counter("requests", "10", 1.0);
    }

    let agg_for_task = Arc::clone(&aggregator);
    let handle = tokio::spawn(async move {
        upstream_server::run(listener, agg_for_task).await;
    });

    let mut counters = Counters::new();
    counters.insert("requests".to_string(), 7);
    let mut timers = Timers::new();
    timers.insert("latency".to_string(), vec![5.0, 15.0]);

    let payload = UpstreamPayload {
        host: "edge-1".to_string(),
        counters,
        gauges: Default::default(),
        sets: Sets::new(),
        timers,
        internal: InternalPayload::from_telemetry(&InternalTelemetry::new()),
    };
    let frame = encode_frame(&payload).unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&frame).await.unwrap();
    stream.shutdown().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    let agg = aggregator.lock().await;
    assert_eq!(agg.counters()["requests"], 17);
    assert_eq!(agg.timers()["latency"], vec![5.0, 15.0]);
}
