//! Response types for the HTTP service

use chrono::{DateTime, Utc};
use glowboost_core::{BookingId, BookingView, ClientId, SalonId, SyncOutcome};
use serde::Serialize;

/// Acknowledgement returned to Cal.com for accepted deliveries
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: String,
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_event: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub salon_id: Option<SalonId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_booking_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

impl From<SyncOutcome> for WebhookResponse {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Ignored { trigger_event } => Self {
                message: "Event ignored".to_string(),
                status: "ignored".to_string(),
                trigger_event: Some(trigger_event.as_str().to_string()),
                salon_id: None,
                client_id: None,
                booking_id: None,
                external_booking_id: None,
                duplicate: None,
            },
            SyncOutcome::Synced {
                salon_id,
                client_id,
                booking_id,
                external_booking_id,
                duplicate,
            } => Self {
                message: "Booking synced".to_string(),
                status: "synced".to_string(),
                trigger_event: None,
                salon_id: Some(salon_id),
                client_id: Some(client_id),
                booking_id: Some(booking_id),
                external_booking_id: Some(external_booking_id.as_i64()),
                duplicate: Some(duplicate),
            },
        }
    }
}

/// Dashboard booking list
#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub salon_id: SalonId,
    pub bookings: Vec<BookingView>,
    pub total: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
