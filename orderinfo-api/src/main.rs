//! Order Info API Server Entry Point
//!
//! Bootstraps configuration, prepares the store, warms the cache, starts the
//! ingestion task and serves the Axum HTTP API until a shutdown signal or a
//! fatal event stream error.

use std::sync::Arc;

use orderinfo_api::telemetry::{init_tracer, metrics, TelemetryConfig, METRICS};
use orderinfo_api::{
    create_router, ApiConfig, ApiError, ApiResult, AppState, DbConfig, IngestPipeline,
    NatsEventSource, PgOrderStore, RouterOptions, StreamConfig,
};
use orderinfo_storage::{warm_up, OrderCache, OrderStore};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracer(&telemetry_config)?;
    if let Err(e) = METRICS.as_ref() {
        tracing::warn!(error = %e, "Metrics registration failed; continuing without metrics");
    }

    let api_config = ApiConfig::from_env()?;
    let stream_config = StreamConfig::from_env();
    let db_config = DbConfig::from_env();

    let pg = PgOrderStore::from_config(&db_config)?;
    if db_config.bootstrap_schema {
        pg.ensure_schema().await?;
    }
    let store: Arc<dyn OrderStore> = Arc::new(pg);

    let cache = Arc::new(OrderCache::new());
    if api_config.cache_warmup {
        let report = warm_up(&cache, store.as_ref()).await;
        if !report.completed {
            tracing::warn!(loaded = report.loaded, "Cache warm-up stopped early");
        }
    }
    if let Some(metrics) = metrics() {
        metrics.record_cache_stats(&cache.stats());
    }

    let state = AppState::new(cache, store);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Ingestion
    let mut source = NatsEventSource::connect(&stream_config).await?;
    let pipeline = IngestPipeline::new(state.reads());
    let ingest_shutdown = shutdown_rx.clone();
    let mut ingest =
        tokio::spawn(async move { pipeline.run(&mut source, ingest_shutdown).await });

    // HTTP
    let app = create_router(
        state,
        RouterOptions::from_config(&api_config, &telemetry_config),
    );
    let addr = api_config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Starting order info API server");

    let server_shutdown = shutdown_rx.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { wait_for_shutdown(server_shutdown).await });
    let mut server = tokio::spawn(async move { server.await });

    let finished_early = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
            None
        }
        joined = &mut ingest => Some(joined),
    };
    let _ = shutdown_tx.send(true);

    let grace = api_config.shutdown_grace;
    let ingest_result = match finished_early {
        Some(joined) => joined,
        None => match tokio::time::timeout(grace, &mut ingest).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!("Ingestion did not stop within the grace period");
                ingest.abort();
                Ok(Ok(Default::default()))
            }
        },
    };

    match tokio::time::timeout(grace, &mut server).await {
        Ok(Ok(Ok(()))) => tracing::info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task failed"),
        Err(_) => {
            tracing::warn!("In-flight requests did not finish within the grace period");
            server.abort();
        }
    }

    match ingest_result {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(e) => Err(ApiError::internal_error(format!("Ingestion task failed: {}", e))),
    }
}

async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
