//! # Booking Store
//!
//! Storage abstraction for salons, clients and bookings.
//!
//! Implementations must make [`BookingStore::upsert_client`] and
//! [`BookingStore::record_booking`] atomic with respect to their natural keys
//! (`(salon_id, phone)` and `external_booking_id`). Concurrent deliveries for
//! the same key must never produce duplicate rows.

use crate::model::{BookingView, Client, ClientUpsert, NewBooking, Salon};
use crate::{BookingId, SalonId};
use async_trait::async_trait;

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryBookingStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresBookingStore;

// ============================================================================
// Results
// ============================================================================

/// Result of a client upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertedClient {
    pub client: Client,
    /// `true` when no client existed for `(salon_id, phone)`
    pub created: bool,
}

/// Result of recording a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedBooking {
    pub booking_id: BookingId,
    /// `false` when a booking with the same external ID already existed
    pub inserted: bool,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by store implementations.
///
/// Driver-specific errors are converted into one of these variants so that
/// raw database errors never cross the store boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Store operation failed: {message}")]
    OperationFailed { message: String },

    #[error("Stored record is invalid: {message}")]
    CorruptRecord { message: String },
}

impl StoreError {
    /// Check if store error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::OperationFailed { .. } => true,
            Self::ConstraintViolation { .. } => false,
            Self::CorruptRecord { .. } => false,
        }
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Privileged data access used by the sync pipeline and dashboard reads
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Exact-match lookup of a salon by organizer email
    async fn find_salon_by_organizer_email(
        &self,
        organizer_email: &str,
    ) -> Result<Option<Salon>, StoreError>;

    /// Insert or update the client keyed by `(salon_id, phone)`.
    ///
    /// On conflict, `full_name` and `email` are overwritten with the incoming
    /// values.
    async fn upsert_client(&self, client: ClientUpsert) -> Result<UpsertedClient, StoreError>;

    /// Insert the booking unless one with the same external ID exists.
    ///
    /// A duplicate returns the existing booking's ID with `inserted = false`.
    async fn record_booking(&self, booking: NewBooking) -> Result<RecordedBooking, StoreError>;

    /// Bookings of one salon joined with their clients, by start time
    async fn list_bookings(&self, salon_id: &SalonId) -> Result<Vec<BookingView>, StoreError>;

    /// Cheap connectivity check for readiness checks
    async fn ping(&self) -> Result<(), StoreError>;
}
