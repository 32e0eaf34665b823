//! # GlowBoost Core
//!
//! Core business logic for the GlowBoost booking sync service.
//!
//! This crate receives booking notifications from the Cal.com scheduling
//! provider, authenticates them, and reconciles them into a local store of
//! salons, clients and bookings.
//!
//! ## Architecture
//!
//! - Business logic depends only on the [`BookingStore`] trait
//! - Storage implementations are injected at runtime
//! - The pipeline itself lives in [`sync::BookingSyncProcessor`]
//!
//! ## Usage
//!
//! ```rust
//! use glowboost_core::{SalonId, ClientId};
//!
//! let salon_id = SalonId::new("s1").unwrap();
//! let client_id = ClientId::new();
//! assert_eq!(salon_id.as_str(), "s1");
//! assert!(!client_id.to_string().is_empty());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use uuid::Uuid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Identifier of a salon (tenant).
///
/// Salons are provisioned out-of-band, so the identifier is an opaque string
/// chosen by whoever created the salon record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalonId(String);

impl SalonId {
    /// Create new salon ID with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "salon_id".to_string(),
            });
        }

        if value.len() > 128 {
            return Err(ValidationError::TooLong {
                field: "salon_id".to_string(),
                max_length: 128,
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SalonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SalonId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Durable identifier of a client record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Generate a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

/// Durable identifier of a booking record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Generate a new random booking ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BookingId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

/// Numeric booking identifier assigned by the booking provider.
///
/// This is the reconciliation key: a booking is recorded at most once per
/// external booking ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalBookingId(i64);

impl ExternalBookingId {
    /// Create new external booking ID
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get numeric value
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ExternalBookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExternalBookingId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<i64>().map_err(|_| ParseError::InvalidFormat {
            expected: "integer".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self::new(id))
    }
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Deployment environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Local development; the only profile allowed to relax security checks
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ParseError::InvalidFormat {
                expected: "development, staging, or production".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures requiring immediate attention
    Security,
    /// Configuration errors preventing startup
    Configuration,
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },
}

impl ValidationError {
    /// Name of the field that failed validation
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field } => field,
            Self::InvalidFormat { field, .. } => field,
            Self::TooLong { field, .. } => field,
        }
    }
}

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Domain records for salons, clients and bookings
pub mod model;

/// Store abstraction and adapters
pub mod store;

/// Booking sync pipeline
pub mod sync;

/// Cal.com webhook signature verification and payload decoding
pub mod webhook;

pub use model::{Booking, BookingStatus, BookingView, Client, ClientUpsert, NewBooking, Salon};
pub use store::{BookingStore, InMemoryBookingStore, RecordedBooking, StoreError, UpsertedClient};
pub use sync::{BookingSyncProcessor, SyncError, SyncOutcome};
pub use webhook::{
    BookingCreated, CalEvent, PayloadError, SignatureCheck, SignatureVerifier, WebhookEnvelope,
    WebhookRequest, WebhookSecret,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
