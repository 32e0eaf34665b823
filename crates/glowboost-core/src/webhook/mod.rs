//! # Webhook Module
//!
//! Inbound Cal.com webhook handling: raw request capture, signature
//! verification and payload decoding.

use bytes::Bytes;
use chrono::{DateTime, Utc};

pub mod payload;
pub mod signature;

pub use payload::{
    parse_event, Attendee, BookingCreated, CalEvent, PayloadError, TriggerEvent, WebhookEnvelope,
};
pub use signature::{
    compute_signature, verify_signature, SignatureCheck, SignatureVerifier, WebhookSecret,
    SIGNATURE_HEADER,
};

/// Raw webhook delivery as received over HTTP.
///
/// The body is kept as the exact bytes sent by the provider; signature
/// verification runs against these bytes, never a re-serialized form.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub body: Bytes,
    pub signature: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl WebhookRequest {
    /// Create new webhook request
    pub fn new(body: Bytes, signature: Option<String>) -> Self {
        Self {
            body,
            signature,
            received_at: Utc::now(),
        }
    }

    /// Get signature header value if present
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }
}
