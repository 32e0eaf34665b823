//! Router-level tests for the HTTP service.

use super::*;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use glowboost_core::{
    webhook::compute_signature, BookingView, ClientUpsert, InMemoryBookingStore, NewBooking,
    RecordedBooking, Salon, StoreError, UpsertedClient, WebhookSecret,
};
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

const SECRET: &str = "whsec_router";
const API_TOKEN: &str = "dash-token-router";

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.webhook.secret = Some(WebhookSecret::new(SECRET).unwrap());
    config.server.max_body_size = 4096;
    config.dashboard.api_token = Some(ApiToken::new(API_TOKEN).unwrap());
    config
}

fn bookings_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get("/api/salons/s1/bookings");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn seeded_store() -> InMemoryBookingStore {
    InMemoryBookingStore::with_salons([Salon::new(
        SalonId::new("s1").unwrap(),
        "owner@salon.example",
    )])
    .unwrap()
}

fn app_with(config: ServiceConfig, store: Arc<dyn BookingStore>) -> (Router, AppState) {
    let state = AppState::from_config(config, store).unwrap();
    (create_router(state.clone()), state)
}

fn booking_body() -> Vec<u8> {
    serde_json::json!({
        "triggerEvent": "BOOKING_CREATED",
        "payload": {
            "id": 501,
            "uid": "abc-1",
            "title": "Lash Fill",
            "startTime": "2024-12-10T10:00:00Z",
            "endTime": "2024-12-10T10:45:00Z",
            "attendees": [
                { "name": "Jane Doe", "email": "jane@example.com", "phoneNumber": "+15551234567" }
            ],
            "organizer": { "email": "owner@salon.example" }
        }
    })
    .to_string()
    .into_bytes()
}

fn signed_post(body: Vec<u8>) -> Request<Body> {
    let secret = WebhookSecret::new(SECRET).unwrap();
    let signature = compute_signature(&body, &secret);
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/cal")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Store whose every call fails or panics
struct BrokenStore {
    panic: bool,
}

#[async_trait]
impl BookingStore for BrokenStore {
    async fn find_salon_by_organizer_email(&self, _: &str) -> Result<Option<Salon>, StoreError> {
        Err(StoreError::Unavailable {
            message: "down".to_string(),
        })
    }

    async fn upsert_client(&self, _: ClientUpsert) -> Result<UpsertedClient, StoreError> {
        Err(StoreError::Unavailable {
            message: "down".to_string(),
        })
    }

    async fn record_booking(&self, _: NewBooking) -> Result<RecordedBooking, StoreError> {
        Err(StoreError::Unavailable {
            message: "down".to_string(),
        })
    }

    async fn list_bookings(&self, _: &SalonId) -> Result<Vec<BookingView>, StoreError> {
        Err(StoreError::Unavailable {
            message: "down".to_string(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.panic {
            panic!("store driver crashed");
        }
        Err(StoreError::Unavailable {
            message: "down".to_string(),
        })
    }
}

// ============================================================================
// Webhook endpoint
// ============================================================================

mod webhook_tests {
    use super::*;

    #[tokio::test]
    async fn test_signed_booking_is_synced() {
        let store = seeded_store();
        let (app, state) = app_with(test_config(), Arc::new(store.clone()));

        let response = app.oneshot(signed_post(booking_body())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Booking synced");
        assert_eq!(body["status"], "synced");
        assert_eq!(body["duplicate"], false);
        assert_eq!(body["external_booking_id"], 501);
        assert_eq!(store.booking_count().unwrap(), 1);
        assert_eq!(state.metrics.deliveries("synced"), 1);
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let store = seeded_store();
        let (app, _) = app_with(test_config(), Arc::new(store.clone()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/webhooks/cal")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");
        assert_eq!(json_body(response).await["message"], "Method not allowed");
        assert_eq!(store.booking_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let store = seeded_store();
        let (app, state) = app_with(test_config(), Arc::new(store.clone()));

        let response = app
            .oneshot(signed_post(vec![b'x'; 8192]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["status"], 413);
        assert_eq!(state.metrics.deliveries("payload_too_large"), 1);
    }

    #[tokio::test]
    async fn test_store_outage_is_internal_error() {
        let (app, state) = app_with(test_config(), Arc::new(BrokenStore { panic: false }));

        let response = app.oneshot(signed_post(booking_body())).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Failed to save booking");
        assert_eq!(state.metrics.deliveries("store_error"), 1);
    }

    #[tokio::test]
    async fn test_custom_endpoint_path() {
        let mut config = test_config();
        config.webhook.endpoint_path = "/hooks/calcom".to_string();
        let (app, _) = app_with(config, Arc::new(seeded_store()));

        let response = app
            .clone()
            .oneshot(signed_post(booking_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut request = signed_post(booking_body());
        *request.uri_mut() = "/hooks/calcom".parse().unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

// ============================================================================
// Read API, health and observability
// ============================================================================

mod endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_is_always_ok() {
        let (app, _) = app_with(test_config(), Arc::new(BrokenStore { panic: false }));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_reflects_store() {
        let (ready_app, _) = app_with(test_config(), Arc::new(seeded_store()));
        let response = ready_app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (broken_app, _) = app_with(test_config(), Arc::new(BrokenStore { panic: false }));
        let response = broken_app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["ready"], false);
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let (app, _) = app_with(test_config(), Arc::new(BrokenStore { panic: true }));

        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(!body["error"].as_str().unwrap().contains("crashed"));
    }

    #[tokio::test]
    async fn test_bookings_listing() {
        let store = seeded_store();
        let (app, _) = app_with(test_config(), Arc::new(store));

        let response = app
            .clone()
            .oneshot(signed_post(booking_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(bookings_request(Some(API_TOKEN))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total"], 1);
        let first = &body["bookings"][0];
        assert_eq!(first["clientName"], "Jane Doe");
        assert_eq!(first["service"], "Lash Fill");
        assert_eq!(first["date"], "2024-12-10");
        assert_eq!(first["time"], "10:00 AM");
        assert_eq!(first["status"], "confirmed");
    }

    #[tokio::test]
    async fn test_bookings_listing_requires_token() {
        let (app, _) = app_with(test_config(), Arc::new(seeded_store()));
        app.clone()
            .oneshot(signed_post(booking_body()))
            .await
            .unwrap();

        for token in [None, Some("wrong-token"), Some("")] {
            let response = app.clone().oneshot(bookings_request(token)).await.unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "token {token:?}");
            assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
            let body = json_body(response).await;
            assert_eq!(body["error"], "Unauthorized");
            assert!(!body.to_string().contains("jane@example.com"));
        }
    }

    #[tokio::test]
    async fn test_bookings_listing_refused_without_configured_token() {
        let mut config = test_config();
        config.dashboard.api_token = None;
        let (app, _) = app_with(config, Arc::new(seeded_store()));

        let response = app.oneshot(bookings_request(Some(API_TOKEN))).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_counters() {
        let (app, _) = app_with(test_config(), Arc::new(seeded_store()));

        let ignored = serde_json::json!({ "triggerEvent": "PING" })
            .to_string()
            .into_bytes();
        app.clone().oneshot(signed_post(ignored)).await.unwrap();

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(text.contains("glowboost_webhook_deliveries_total{outcome=\"ignored\"} 1"));
    }
}

// ============================================================================
// Middleware
// ============================================================================

mod middleware_tests {
    use super::*;

    #[tokio::test]
    async fn test_correlation_id_is_echoed() {
        let (app, _) = app_with(test_config(), Arc::new(seeded_store()));

        let response = app
            .oneshot(
                Request::get("/health")
                    .header(CORRELATION_ID_HEADER, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[CORRELATION_ID_HEADER], "req-123");
    }

    #[tokio::test]
    async fn test_correlation_id_is_generated() {
        let (app, _) = app_with(test_config(), Arc::new(seeded_store()));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let generated = response.headers()[CORRELATION_ID_HEADER].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());
    }
}
