mod handlers;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::config::HttpConfig;
use crate::domain::order::OrderQueryHandler;
use crate::metrics::Metrics;

// ============================================================================
// HTTP API - order lookups, Prometheus scrape and liveness
// ============================================================================

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/orders/{order_uid}", web::get().to(handlers::get_order))
        .route("/metrics", web::get().to(handlers::metrics))
        .route("/health", web::get().to(handlers::health));
}

/// Binds the server. Signal handling is left to the caller, which stops the
/// server through its handle.
pub fn start_http_server(
    handler: web::Data<OrderQueryHandler>,
    metrics: web::Data<Metrics>,
    config: &HttpConfig,
) -> std::io::Result<Server> {
    tracing::info!(
        keep_alive = ?config.keep_alive,
        request_timeout = ?config.request_timeout,
        "Starting HTTP server on http://0.0.0.0:{}",
        config.port
    );

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(handler.clone())
            .app_data(metrics.clone())
            .configure(configure)
    })
    .disable_signals()
    .shutdown_timeout(config.shutdown_timeout.as_secs())
    .client_request_timeout(config.request_timeout)
    .client_disconnect_timeout(config.disconnect_timeout)
    .keep_alive(config.keep_alive)
    .bind(("0.0.0.0", config.port))?
    .run();

    Ok(server)
}
