//! # GlowBoost HTTP Service
//!
//! HTTP server receiving Cal.com booking webhooks and reconciling them into
//! the salon booking store.
//!
//! This service provides:
//! - Cal.com webhook endpoint with signature verification
//! - Dashboard read endpoint for a salon's bookings
//! - Health, readiness and Prometheus metrics endpoints

use axum::{
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use glowboost_core::{
    webhook::SIGNATURE_HEADER, BookingStore, BookingSyncProcessor, SalonId, WebhookRequest,
};
use std::{any::Any, future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::{error, info, instrument, warn};

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

pub use config::{
    ApiToken, DashboardConfig, LoggingConfig, SalonSeed, ServerConfig, ServiceConfig,
    StoreBackend, StoreConfig, WebhookConfig,
};
pub use errors::{ApiError, ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;
pub use responses::{BookingListResponse, HealthResponse, ReadinessResponse, WebhookResponse};

/// Header carrying the request correlation ID
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Booking sync pipeline
    pub processor: Arc<BookingSyncProcessor>,

    /// Store used for reads and readiness
    pub store: Arc<dyn BookingStore>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        processor: BookingSyncProcessor,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let store = processor.store().clone();
        Self {
            config: Arc::new(config),
            processor: Arc::new(processor),
            store,
            metrics,
        }
    }

    /// Build state from configuration and an already constructed store
    pub fn from_config(
        config: ServiceConfig,
        store: Arc<dyn BookingStore>,
    ) -> Result<Self, ServiceError> {
        let verifier = config.signature_verifier()?;
        let metrics = ServiceMetrics::new().map_err(|e| {
            ServiceError::Configuration(ConfigError::Invalid {
                message: format!("Failed to initialize metrics: {}", e),
            })
        })?;

        Ok(Self::new(
            config,
            BookingSyncProcessor::new(store, verifier),
            metrics,
        ))
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let server = state.config.server.clone();

    let webhook_routes = Router::new().route(
        &state.config.webhook.endpoint_path,
        post(handle_webhook).fallback(method_not_allowed),
    );

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check));

    let api_routes = Router::new()
        .route("/api/salons/{salon_id}/bookings", get(list_salon_bookings))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    let mut router = Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(api_routes)
        .merge(observability_routes)
        .layer(DefaultBodyLimit::max(server.max_body_size));

    if server.enable_compression {
        router = router.layer(CompressionLayer::new());
    }
    if server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(CatchPanicLayer::custom(handle_panic))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(
    config: ServiceConfig,
    store: Arc<dyn BookingStore>,
) -> Result<(), ServiceError> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            ServiceError::Configuration(ConfigError::Invalid {
                message: format!("Invalid server address: {}", e),
            })
        })?;
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::from_config(config, store)?;
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    // In-flight requests get `shutdown_timeout` to drain after the signal.
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(());
    });

    let drain_deadline = async move {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server.into_future() => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; abandoning in-flight requests"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle Cal.com webhook deliveries
///
/// The body is taken as raw bytes so the signature is checked against
/// exactly what Cal.com signed. Every delivery produces one terminal
/// response and one metrics sample.
#[instrument(skip(state, headers, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    let start = std::time::Instant::now();

    let result = process_delivery(&state, &headers, body).await;

    let outcome = match &result {
        Ok(response) => response.label(),
        Err(e) => handler_error_label(e),
    };
    state.metrics.record_delivery(outcome, start.elapsed());

    result.map(|response| Json(response.into()))
}

async fn process_delivery(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<glowboost_core::SyncOutcome, WebhookHandlerError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            WebhookHandlerError::PayloadTooLarge {
                max_size: state.config.server.max_body_size,
            }
        } else {
            WebhookHandlerError::InvalidBody {
                message: rejection.body_text(),
            }
        }
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    info!(
        body_size = body.len(),
        has_signature = signature.is_some(),
        "Received webhook delivery"
    );

    let request = WebhookRequest::new(body, signature);
    Ok(state.processor.process(&request).await?)
}

fn handler_error_label(error: &WebhookHandlerError) -> &'static str {
    match error {
        WebhookHandlerError::Sync(e) => e.label(),
        WebhookHandlerError::InvalidBody { .. } => "invalid_body",
        WebhookHandlerError::PayloadTooLarge { .. } => "payload_too_large",
    }
}

/// Any method other than POST on the webhook path
async fn method_not_allowed() -> Response {
    warn!("Rejected webhook request with unsupported method");
    let mut response = (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "message": "Method not allowed" })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("POST"));
    response
}

// ============================================================================
// Read API Handlers
// ============================================================================

/// Bookings of one salon for the dashboard
#[instrument(skip(state))]
async fn list_salon_bookings(
    State(state): State<AppState>,
    Path(salon_id): Path<String>,
) -> Result<Json<BookingListResponse>, ApiError> {
    let salon_id = SalonId::new(salon_id).map_err(|e| ApiError::InvalidSalonId {
        message: e.to_string(),
    })?;

    let bookings = state.store.list_bookings(&salon_id).await?;

    Ok(Json(BookingListResponse {
        salon_id,
        total: bookings.len(),
        bookings,
    }))
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic liveness check
#[instrument(skip_all)]
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check; fails while the store is unreachable
#[instrument(skip(state))]
async fn handle_readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                timestamp: chrono::Utc::now(),
                reason: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    ready: false,
                    timestamp: chrono::Utc::now(),
                    reason: Some("store unavailable".to_string()),
                }),
            )
        }
    }
}

// ============================================================================
// Observability Handlers
// ============================================================================

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses an inbound `x-correlation-id` or generates one, echoes it on the
/// response, and logs completion at a level matching the status class.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

/// Bearer-token gate for the dashboard read API
///
/// Client contact details are only served to callers presenting
/// `Authorization: Bearer <dashboard.api_token>`. With no token configured
/// every request is refused.
async fn require_api_token(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match (&state.config.dashboard.api_token, presented) {
        (Some(expected), Some(presented)) if expected.matches(presented) => {
            next.run(request).await
        }
        (None, _) => {
            warn!("Dashboard API token is not configured; refusing request");
            ApiError::Unauthorized.into_response()
        }
        _ => ApiError::Unauthorized.into_response(),
    }
}

/// Convert a handler panic into a sanitized 500
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "Request handler panicked");

    errors::error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error occurred. Please try again later.".to_string(),
    )
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
