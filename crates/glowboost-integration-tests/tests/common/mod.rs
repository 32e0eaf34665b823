//! Common test utilities for glowboost-api integration tests
//!
//! This module provides:
//! - A router wired to an in-memory store seeded with one salon
//! - Request builders for signed, unsigned and tampered deliveries
//! - Cal.com payload fixtures

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use glowboost_api::{create_router, ApiToken, AppState, ServiceConfig};
use glowboost_core::{
    webhook::{compute_signature, SIGNATURE_HEADER},
    InMemoryBookingStore, Salon, SalonId, WebhookSecret,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "whsec_integration";
pub const SALON_ID: &str = "s1";
pub const ORGANIZER_EMAIL: &str = "owner@salon.example";
pub const WEBHOOK_PATH: &str = "/api/webhooks/cal";
pub const API_TOKEN: &str = "dash-token-integration";

/// Router plus a handle on the store it writes to
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: InMemoryBookingStore,
}

impl TestApp {
    /// Signature enforced, one salon provisioned
    pub fn new() -> Self {
        let mut config = ServiceConfig::default();
        config.webhook.secret = Some(WebhookSecret::new(SECRET).unwrap());
        config.dashboard.api_token = Some(ApiToken::new(API_TOKEN).unwrap());
        Self::with_config(config)
    }

    /// Unsigned deliveries accepted, one salon provisioned
    #[allow(dead_code)]
    pub fn unsigned() -> Self {
        let mut config = ServiceConfig::default();
        config.webhook.allow_unsigned = true;
        Self::with_config(config)
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let store = InMemoryBookingStore::with_salons([Salon::new(
            SalonId::new(SALON_ID).unwrap(),
            ORGANIZER_EMAIL,
        )])
        .unwrap();

        let state = AppState::from_config(config, Arc::new(store.clone())).unwrap();
        let router = create_router(state.clone());

        Self {
            router,
            state,
            store,
        }
    }

    /// Send one request through a clone of the router
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Assert the store is untouched
    #[allow(dead_code)]
    pub fn assert_no_writes(&self) {
        assert_eq!(self.store.client_count().unwrap(), 0, "expected no client rows");
        assert_eq!(self.store.booking_count().unwrap(), 0, "expected no booking rows");
    }
}

// ============================================================================
// Payload fixtures
// ============================================================================

/// The canonical booking: Jane Doe's lash fill at salon s1
pub fn booking_created() -> Value {
    json!({
        "triggerEvent": "BOOKING_CREATED",
        "createdAt": "2024-12-01T08:00:00Z",
        "payload": {
            "id": 501,
            "uid": "abc-1",
            "title": "Lash Fill",
            "startTime": "2024-12-10T10:00:00Z",
            "endTime": "2024-12-10T10:45:00Z",
            "attendees": [
                {
                    "name": "Jane Doe",
                    "email": "jane@example.com",
                    "phoneNumber": "+15551234567"
                }
            ],
            "organizer": { "email": ORGANIZER_EMAIL }
        }
    })
}

/// Envelope for a non-creation trigger event
#[allow(dead_code)]
pub fn other_event(trigger_event: &str) -> Value {
    let mut event = booking_created();
    event["triggerEvent"] = json!(trigger_event);
    event
}

// ============================================================================
// Request builders
// ============================================================================

pub fn sign(body: &[u8]) -> String {
    compute_signature(body, &WebhookSecret::new(SECRET).unwrap())
}

/// POST with a valid signature over exactly these bytes
pub fn signed_post(body: impl Into<Vec<u8>>) -> Request<Body> {
    let body = body.into();
    let signature = sign(&body);
    Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

/// POST with no signature header
#[allow(dead_code)]
pub fn unsigned_post(body: impl Into<Vec<u8>>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

/// POST with an explicit signature header value
#[allow(dead_code)]
pub fn post_with_signature(body: impl Into<Vec<u8>>, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.into()))
        .unwrap()
}

pub fn json_bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

/// Read the response body as JSON, returning the status alongside
pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}
