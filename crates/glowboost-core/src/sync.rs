//! # Booking Sync
//!
//! Reconciles a verified `BOOKING_CREATED` delivery into the store.
//!
//! Processing order:
//!
//! 1. Parse the envelope (malformed JSON is rejected)
//! 2. Acknowledge and drop any trigger other than `BOOKING_CREATED`
//! 3. Verify the HMAC signature over the raw body
//! 4. Decode and validate the booking payload
//! 5. Resolve the salon from the organizer email
//! 6. Upsert the client on `(salon_id, phone)`
//! 7. Record the booking unless its external ID is already known
//!
//! Each step either advances or terminates with a [`SyncError`]; no step is
//! retried internally. Cal.com redelivers on non-2xx responses, and steps 6
//! and 7 are idempotent so redelivery is safe.

use crate::model::{ClientUpsert, NewBooking, Salon};
use crate::store::{BookingStore, RecordedBooking, StoreError, UpsertedClient};
use crate::webhook::{
    BookingCreated, PayloadError, SignatureCheck, SignatureVerifier, TriggerEvent,
    WebhookEnvelope, WebhookRequest,
};
use crate::{BookingId, ClientId, ErrorCategory, ExternalBookingId, SalonId, ValidationError};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Outcomes and errors
// ============================================================================

/// Successful result of processing one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Trigger is not reconciled by this service
    Ignored { trigger_event: TriggerEvent },

    /// Booking is present in the store
    Synced {
        salon_id: SalonId,
        client_id: ClientId,
        booking_id: BookingId,
        external_booking_id: ExternalBookingId,
        /// `true` when the booking had already been recorded
        duplicate: bool,
    },
}

impl SyncOutcome {
    /// Short label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored { .. } => "ignored",
            Self::Synced {
                duplicate: true, ..
            } => "duplicate",
            Self::Synced { .. } => "synced",
        }
    }
}

/// Reasons a delivery was not reconciled
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Malformed JSON body: {message}")]
    MalformedJson { message: String },

    #[error("Invalid booking payload: {0}")]
    InvalidPayload(#[from] ValidationError),

    #[error("Webhook signature rejected: {}", .check.as_str())]
    InvalidSignature { check: SignatureCheck },

    #[error("No salon is linked to organizer email '{organizer_email}'")]
    SalonNotFound { organizer_email: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<PayloadError> for SyncError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::InvalidJson(e) => Self::MalformedJson {
                message: e.to_string(),
            },
            PayloadError::InvalidBooking(e) => Self::InvalidPayload(e),
        }
    }
}

impl SyncError {
    /// Check if a redelivery could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSignature { .. } => ErrorCategory::Security,
            Self::Store(e) if e.is_transient() => ErrorCategory::Transient,
            _ => ErrorCategory::Permanent,
        }
    }

    /// Short label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::MalformedJson { .. } => "malformed_json",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::SalonNotFound { .. } => "salon_not_found",
            Self::Store(_) => "store_error",
        }
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Runs the booking sync pipeline against a [`BookingStore`]
#[derive(Clone)]
pub struct BookingSyncProcessor {
    store: Arc<dyn BookingStore>,
    verifier: SignatureVerifier,
}

impl BookingSyncProcessor {
    pub fn new(store: Arc<dyn BookingStore>, verifier: SignatureVerifier) -> Self {
        Self { store, verifier }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Process one webhook delivery end to end
    #[instrument(skip(self, request), fields(
        body_size = request.body.len(),
        has_signature = request.signature.is_some(),
    ))]
    pub async fn process(&self, request: &WebhookRequest) -> Result<SyncOutcome, SyncError> {
        // 1. Envelope
        let envelope = WebhookEnvelope::from_slice(&request.body).map_err(|e| {
            warn!(error = %e, "Rejecting webhook with malformed JSON body");
            SyncError::from(e)
        })?;

        // 2. Trigger filter
        if !envelope.trigger_event.is_booking_created() {
            info!(
                trigger_event = %envelope.trigger_event,
                "Ignoring webhook trigger"
            );
            return Ok(SyncOutcome::Ignored {
                trigger_event: envelope.trigger_event,
            });
        }

        // 3. Signature
        let check = self.verifier.check(&request.body, request.signature());
        if !check.is_accepted() {
            warn!(reason = check.as_str(), "Webhook signature rejected");
            return Err(SyncError::InvalidSignature { check });
        }
        if check == SignatureCheck::Skipped {
            warn!("Accepting unsigned webhook delivery; signature verification is disabled");
        } else {
            debug!(result = check.as_str(), "Webhook signature accepted");
        }

        // 4. Payload
        let booking = envelope.into_booking_created().map_err(|e| {
            warn!(error = %e, "Rejecting invalid booking payload");
            SyncError::from(e)
        })?;

        info!(
            external_booking_id = %booking.external_booking_id,
            external_uid = %booking.external_uid,
            "Processing booking creation"
        );

        // 5-7. Reconcile
        let salon = self.resolve_salon(&booking.organizer_email).await?;
        let client = self.upsert_client(&salon, &booking).await?;
        let recorded = self.record_booking(&salon, &client, &booking).await?;

        let outcome = SyncOutcome::Synced {
            salon_id: salon.id,
            client_id: client.client.id,
            booking_id: recorded.booking_id,
            external_booking_id: booking.external_booking_id,
            duplicate: !recorded.inserted,
        };

        info!(
            external_booking_id = %booking.external_booking_id,
            booking_id = %recorded.booking_id,
            outcome = outcome.label(),
            "Booking synced"
        );

        Ok(outcome)
    }

    /// Find the salon that owns the organizer's calendar
    pub async fn resolve_salon(&self, organizer_email: &str) -> Result<Salon, SyncError> {
        let salon = self
            .store
            .find_salon_by_organizer_email(organizer_email)
            .await
            .map_err(|e| {
                warn!(error = %e, "Salon lookup failed");
                SyncError::Store(e)
            })?;

        match salon {
            Some(salon) => {
                debug!(salon_id = %salon.id, "Resolved salon");
                Ok(salon)
            }
            None => {
                warn!(organizer_email, "No salon found for organizer");
                Err(SyncError::SalonNotFound {
                    organizer_email: organizer_email.to_string(),
                })
            }
        }
    }

    /// Create or refresh the attendee's client record
    pub async fn upsert_client(
        &self,
        salon: &Salon,
        booking: &BookingCreated,
    ) -> Result<UpsertedClient, SyncError> {
        let upsert = ClientUpsert {
            salon_id: salon.id.clone(),
            full_name: booking.attendee.name.clone(),
            email: booking.attendee.email.clone(),
            phone: booking.attendee.phone.clone(),
        };

        let result = self.store.upsert_client(upsert).await.map_err(|e| {
            warn!(error = %e, salon_id = %salon.id, "Client upsert failed");
            SyncError::Store(e)
        })?;

        debug!(
            client_id = %result.client.id,
            created = result.created,
            "Client upserted"
        );
        Ok(result)
    }

    /// Insert the booking, tolerating redelivery
    pub async fn record_booking(
        &self,
        salon: &Salon,
        client: &UpsertedClient,
        booking: &BookingCreated,
    ) -> Result<RecordedBooking, SyncError> {
        let new_booking = NewBooking {
            salon_id: salon.id.clone(),
            client_id: client.client.id,
            external_booking_id: booking.external_booking_id,
            external_uid: booking.external_uid.clone(),
            service_name: booking.service_name.clone(),
            start_time: booking.start_time,
            end_time: booking.end_time,
        };

        let recorded = self.store.record_booking(new_booking).await.map_err(|e| {
            warn!(
                error = %e,
                external_booking_id = %booking.external_booking_id,
                "Booking insert failed"
            );
            SyncError::Store(e)
        })?;

        if !recorded.inserted {
            info!(
                external_booking_id = %booking.external_booking_id,
                "Booking already recorded, treating delivery as duplicate"
            );
        }
        Ok(recorded)
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
