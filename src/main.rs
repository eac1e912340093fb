use actix_web::web;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod cache;
mod config;
mod domain;
mod ingestion;
mod messaging;
mod metrics;
mod store;
mod utils;

use cache::RecencyCache;
use config::Config;
use domain::order::OrderQueryHandler;
use ingestion::{IngestionPipeline, IngestionWorker};
use messaging::RedpandaConsumer;
use store::{OrderStore, PgOrderStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_ingest=debug"))
        )
        .init();

    tracing::info!("Starting order ingestion service");

    let config = Config::from_env()?;
    let cancel = CancellationToken::new();

    // === 1. Metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Postgres ===
    tracing::info!("Connecting to Postgres...");
    let pool = store::connect_pool(&config.database).await?;
    let pg_store = PgOrderStore::new(pool, config.store.clone(), metrics.clone(), cancel.clone());
    pg_store.ensure_schema().await?;
    let store: Arc<dyn OrderStore> = Arc::new(pg_store);

    // === 3. Cache + read path ===
    let cache = Arc::new(RecencyCache::new(config.cache.capacity));
    let query_handler = web::Data::new(OrderQueryHandler::new(
        cache.clone(),
        store.clone(),
        metrics.clone(),
    ));

    if config.cache.warmup > 0 {
        if let Err(e) = query_handler.warm_up(config.cache.warmup).await {
            tracing::warn!(error = %e, "Cache warm-up failed, starting cold");
        }
    }

    // === 4. Ingestion ===
    let consumer = RedpandaConsumer::new(&config.kafka)?;
    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone(),
        cache.clone(),
        config.ingest.clone(),
        metrics.clone(),
        cancel.clone(),
    ));
    let worker = IngestionWorker::new(
        consumer,
        pipeline,
        config.kafka.backoff,
        config.kafka.jitter,
        cancel.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    // === 5. HTTP ===
    let server = api::start_http_server(query_handler, web::Data::from(metrics.clone()), &config.http)?;
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tracing::info!("All services started, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    cancel.cancel();
    server_handle.stop(true).await;

    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Ingestion worker panicked");
    }
    match server_task.await {
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server error"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
        Ok(Ok(())) => {}
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
