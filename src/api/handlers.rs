use actix_web::{web, HttpResponse, Responder};
use prometheus::{Encoder, TextEncoder};
use uuid::Uuid;

use crate::domain::order::{OrderQueryHandler, QueryError};
use crate::metrics::Metrics;

fn error_body(message: impl Into<String>) -> serde_json::Value {
    serde_json::json!({ "error": message.into() })
}

pub async fn get_order(
    path: web::Path<String>,
    handler: web::Data<OrderQueryHandler>,
) -> HttpResponse {
    let raw = path.into_inner();
    let uid = match Uuid::parse_str(&raw) {
        Ok(uid) => uid,
        Err(_) => {
            tracing::debug!(order_uid = %raw, "Rejected unparsable order uid");
            return HttpResponse::BadRequest().json(error_body("invalid order uid"));
        }
    };

    match handler.get_order(uid).await {
        Ok(order) => HttpResponse::Ok().json(order.as_ref()),
        Err(QueryError::OrderNotFound(_)) => {
            HttpResponse::NotFound().json(error_body(format!("order {uid} does not exist")))
        }
        Err(e) => {
            tracing::error!(order_uid = %uid, error = %e, "Failed to load order");
            HttpResponse::InternalServerError().json(error_body("internal error"))
        }
    }
}

pub async fn metrics(metrics: web::Data<Metrics>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-ingest"
    }))
}
