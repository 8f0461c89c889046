use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};

use crate::{
    front_door::{self, FrontDoor},
    ingest::IngestWorker,
    settings::Settings,
    sink::SledSink,
};

/// Runs the whole pipeline until Ctrl+C or SIGTERM.
///
/// The store is opened once and the ingest worker started before the HTTP
/// listener comes up. When the HTTP side has shut down the worker is stopped
/// without draining.
pub async fn run(cfg: Settings) -> Result<()> {
    let sink = SledSink::from_settings(&cfg)
        .with_context(|| format!("opening store at {}", cfg.store_path().display()))?;

    let worker = IngestWorker::bind(cfg.ingest_addr(), cfg.socket_backlog, Arc::new(sink))
        .with_context(|| format!("binding ingest worker to {}", cfg.ingest_addr()))?
        .insert_timeout(cfg.sink_timeout())
        .start()?;

    let listener = TcpListener::bind(cfg.http_addr())
        .await
        .with_context(|| format!("binding HTTP server to {}", cfg.http_addr()))?;

    let served = front_door::serve(listener, FrontDoor::from_settings(&cfg), shutdown_signal()).await;
    log::info!("HTTP server shut down");

    if !worker.is_running() {
        log::error!("Ingest worker exited before shutdown");
    }

    worker.stop().await;
    served.context("HTTP server failed")
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
