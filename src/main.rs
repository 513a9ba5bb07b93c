//! cardiff - hierarchical statsd-compatible metrics aggregation server.

use std::process;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardiff::cli::{handle_pre_execution_commands, parse_arguments, resolve_config};
use cardiff::coordinator::Coordinator;
use cardiff::error::Result;
use cardiff::{build_sinks, local_hostname, Aggregator};

fn setup_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_application() -> Result<()> {
    setup_logging();

    let cli = parse_arguments();
    let config = resolve_config(&cli)?;

    if handle_pre_execution_commands(&cli, &config)? {
        return Ok(());
    }

    let host = local_hostname();
    info!("starting cardiff on host {host}");

    let aggregator = Arc::new(Mutex::new(Aggregator::new(host.clone())));
    let sinks = build_sinks(&config, &host);
    info!("configured {} delivery sink(s)", sinks.len());

    let mut tasks = Vec::new();

    if config.statsd.enabled {
        let socket = cardiff::net::udp::bind(&config.statsd.host, config.statsd.port).await?;
        info!("statsd UDP ingest listening on {}:{}", config.statsd.host, config.statsd.port);
        let aggregator = Arc::clone(&aggregator);
        tasks.push(tokio::spawn(async move {
            cardiff::net::udp::run(socket, aggregator).await;
        }));
    }

    if config.upstream.enabled {
        let listener = cardiff::net::upstream_server::bind(&config.upstream.host, config.upstream.port).await?;
        info!(
            "upstream TCP merge listening on {}:{}",
            config.upstream.host, config.upstream.port
        );
        let aggregator = Arc::clone(&aggregator);
        tasks.push(tokio::spawn(async move {
            cardiff::net::upstream_server::run(listener, aggregator).await;
        }));
    }

    let coordinator = Coordinator::new(Arc::clone(&aggregator), sinks, config.flush_interval_secs);
    tasks.push(tokio::spawn(async move {
        coordinator.run().await;
    }));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
        }
    }

    for task in tasks {
        task.abort();
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_application().await {
        error!("fatal error: {e}");
        process::exit(1);
    }
}
