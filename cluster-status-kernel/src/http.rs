/**
 * API REST - Serveur HTTP du kernel de monitoring
 *
 * RÔLE :
 * Expose en JSON les métriques écrites par le collecteur externe
 * (load average, PBS, CPU, nœuds, données par cluster).
 *
 * ROUTES :
 * - GET /health                       -> {"status":"ok"}
 * - GET /api/metrics[.php]?type=...   -> handlers::metrics
 * - GET /api/cluster[.php]?name=...   -> handlers::cluster
 * Les alias .php gardent compatibles les anciens clients PHP.
 *
 * MIDDLEWARE (extérieur -> intérieur) :
 * CORS permissif, log des requêtes (+ x-request-id), récupération
 * des panics en 500 JSON, timeout global de 60s.
 */

use axum::extract::Request;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::any::Any;
use std::time::{Duration, Instant};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::handlers::cluster::get_cluster_info;
use crate::handlers::metrics::get_metrics;
use crate::state::AppState;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn build_router(app_state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/api/metrics", get(get_metrics))
        .route("/api/metrics.php", get(get_metrics))
        .route("/api/cluster", get(get_cluster_info))
        .route("/api/cluster.php", get(get_cluster_info))
        .with_state(app_state);

    with_middleware(api)
}

fn with_middleware(router: Router) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(log_requests))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300))
}

// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn log_requests(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        uri = %req.uri(),
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(req).await;
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        tracing::info!(
            status = %response.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        response
    }
    .instrument(span)
    .await
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
