//! Cal.com webhook payload decoding.
//!
//! Decoding happens in two stages. [`WebhookEnvelope::from_slice`] only
//! requires valid JSON and extracts the trigger event, which is enough to
//! acknowledge and drop events the service does not reconcile.
//! [`WebhookEnvelope::into_booking_created`] then performs the strict,
//! required-field decode of a `BOOKING_CREATED` payload.

use crate::{ExternalBookingId, ValidationError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

// ============================================================================
// Trigger events
// ============================================================================

/// Cal.com webhook trigger event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    BookingCreated,
    BookingRescheduled,
    BookingCancelled,
    BookingRequested,
    BookingRejected,
    BookingPaymentInitiated,
    BookingPaid,
    BookingNoShowUpdated,
    MeetingStarted,
    MeetingEnded,
    RecordingReady,
    FormSubmitted,
    Ping,
    /// Any trigger this service does not know about, or none at all
    Unrecognized(String),
}

impl TriggerEvent {
    /// Map the wire name to a trigger event
    pub fn parse(value: &str) -> Self {
        match value {
            "BOOKING_CREATED" => Self::BookingCreated,
            "BOOKING_RESCHEDULED" => Self::BookingRescheduled,
            "BOOKING_CANCELLED" => Self::BookingCancelled,
            "BOOKING_REQUESTED" => Self::BookingRequested,
            "BOOKING_REJECTED" => Self::BookingRejected,
            "BOOKING_PAYMENT_INITIATED" => Self::BookingPaymentInitiated,
            "BOOKING_PAID" => Self::BookingPaid,
            "BOOKING_NO_SHOW_UPDATED" => Self::BookingNoShowUpdated,
            "MEETING_STARTED" => Self::MeetingStarted,
            "MEETING_ENDED" => Self::MeetingEnded,
            "RECORDING_READY" => Self::RecordingReady,
            "FORM_SUBMITTED" => Self::FormSubmitted,
            "PING" => Self::Ping,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Wire name of the trigger event
    pub fn as_str(&self) -> &str {
        match self {
            Self::BookingCreated => "BOOKING_CREATED",
            Self::BookingRescheduled => "BOOKING_RESCHEDULED",
            Self::BookingCancelled => "BOOKING_CANCELLED",
            Self::BookingRequested => "BOOKING_REQUESTED",
            Self::BookingRejected => "BOOKING_REJECTED",
            Self::BookingPaymentInitiated => "BOOKING_PAYMENT_INITIATED",
            Self::BookingPaid => "BOOKING_PAID",
            Self::BookingNoShowUpdated => "BOOKING_NO_SHOW_UPDATED",
            Self::MeetingStarted => "MEETING_STARTED",
            Self::MeetingEnded => "MEETING_ENDED",
            Self::RecordingReady => "RECORDING_READY",
            Self::FormSubmitted => "FORM_SUBMITTED",
            Self::Ping => "PING",
            Self::Unrecognized(name) => name,
        }
    }

    pub fn is_booking_created(&self) -> bool {
        matches!(self, Self::BookingCreated)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Decoded event types
// ============================================================================

/// The person who booked the appointment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
}

/// A fully validated `BOOKING_CREATED` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingCreated {
    pub external_booking_id: ExternalBookingId,
    pub external_uid: String,
    pub service_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendee: Attendee,
    pub organizer_email: String,
}

/// Decoded webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalEvent {
    BookingCreated(BookingCreated),
    Other { trigger_event: TriggerEvent },
}

/// Errors decoding a webhook body
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Invalid booking payload: {0}")]
    InvalidBooking(#[from] ValidationError),
}

// ============================================================================
// Envelope
// ============================================================================

/// Outer webhook envelope: `{ "triggerEvent": ..., "payload": {...} }`
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub trigger_event: TriggerEvent,
    payload: Value,
}

impl WebhookEnvelope {
    /// Parse the envelope from raw body bytes.
    ///
    /// Only JSON syntax is enforced here. A body without a string
    /// `triggerEvent` decodes to [`TriggerEvent::Unrecognized`] so it can be
    /// acknowledged and ignored.
    pub fn from_slice(raw: &[u8]) -> Result<Self, PayloadError> {
        let mut value: Value = serde_json::from_slice(raw).map_err(PayloadError::InvalidJson)?;

        let trigger_event = value
            .get("triggerEvent")
            .and_then(Value::as_str)
            .map(TriggerEvent::parse)
            .unwrap_or_else(|| TriggerEvent::Unrecognized(String::new()));

        let payload = value
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or(Value::Null);

        Ok(Self {
            trigger_event,
            payload,
        })
    }

    /// Decode into a [`CalEvent`], validating booking payloads
    pub fn into_event(self) -> Result<CalEvent, PayloadError> {
        if self.trigger_event.is_booking_created() {
            Ok(CalEvent::BookingCreated(self.into_booking_created()?))
        } else {
            Ok(CalEvent::Other {
                trigger_event: self.trigger_event,
            })
        }
    }

    /// Strictly decode the payload as a booking creation.
    ///
    /// Every field the pipeline writes is required; a missing or blank value
    /// is reported with the JSON path of the offending field.
    pub fn into_booking_created(self) -> Result<BookingCreated, PayloadError> {
        if !self.payload.is_object() {
            return Err(ValidationError::Required {
                field: "payload".to_string(),
            }
            .into());
        }

        let raw: RawBookingPayload =
            serde_json::from_value(self.payload).map_err(|e| ValidationError::InvalidFormat {
                field: "payload".to_string(),
                message: e.to_string(),
            })?;

        Ok(raw.validate()?)
    }
}

/// Parse raw body bytes straight into a [`CalEvent`]
pub fn parse_event(raw: &[u8]) -> Result<CalEvent, PayloadError> {
    WebhookEnvelope::from_slice(raw)?.into_event()
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBookingPayload {
    id: Option<i64>,
    uid: Option<String>,
    title: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    responses: Option<Value>,
    attendees: Option<Vec<RawAttendee>>,
    organizer: Option<RawOrganizer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttendee {
    name: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOrganizer {
    email: Option<String>,
}

/// Booking form response keys that may carry the attendee's phone number
const PHONE_RESPONSE_KEYS: [&str; 3] = ["attendeePhoneNumber", "phoneNumber", "phone"];

impl RawBookingPayload {
    fn validate(self) -> Result<BookingCreated, ValidationError> {
        let id = self.id.ok_or_else(|| required("payload.id"))?;
        let uid = required_text(self.uid, "payload.uid")?;
        let title = required_text(self.title, "payload.title")?;
        let start_time = required_time(self.start_time, "payload.startTime")?;
        let end_time = required_time(self.end_time, "payload.endTime")?;

        let organizer_email = required_text(
            self.organizer.and_then(|o| o.email),
            "payload.organizer.email",
        )?;

        let first = self
            .attendees
            .and_then(|attendees| attendees.into_iter().next())
            .ok_or_else(|| required("payload.attendees"))?;

        let name = required_text(first.name, "payload.attendees[0].name")?;
        let email = non_blank(first.email);
        let phone = non_blank(first.phone_number)
            .or_else(|| self.responses.as_ref().and_then(phone_from_responses))
            .ok_or_else(|| required("payload.attendees[0].phoneNumber"))?;

        Ok(BookingCreated {
            external_booking_id: ExternalBookingId::new(id),
            external_uid: uid,
            service_name: title,
            start_time,
            end_time,
            attendee: Attendee { name, email, phone },
            organizer_email,
        })
    }
}

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ValidationError> {
    non_blank(value).ok_or_else(|| required(field))
}

fn required_time(value: Option<String>, field: &str) -> Result<DateTime<Utc>, ValidationError> {
    let text = required_text(value, field)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidFormat {
            field: field.to_string(),
            message: format!("expected RFC 3339 timestamp, got '{text}'"),
        })
}

/// Booking form responses are either bare strings or `{ "value": ... }`.
fn phone_from_responses(responses: &Value) -> Option<String> {
    PHONE_RESPONSE_KEYS.iter().find_map(|key| {
        let entry = responses.get(key)?;
        let text = entry
            .as_str()
            .or_else(|| entry.get("value").and_then(Value::as_str))?;
        non_blank(Some(text.to_string()))
    })
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
