//! # Domain Records
//!
//! Salons, clients and bookings as the sync pipeline reads and writes them.

use crate::{BookingId, ClientId, ExternalBookingId, ParseError, SalonId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A salon (tenant), resolved from the organizer email of a booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salon {
    pub id: SalonId,
    pub organizer_email: String,
}

impl Salon {
    pub fn new(id: SalonId, organizer_email: impl Into<String>) -> Self {
        Self {
            id,
            organizer_email: organizer_email.into(),
        }
    }
}

/// A client of a salon, unique per `(salon_id, phone)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub salon_id: SalonId,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
}

/// Incoming contact details for the client upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientUpsert {
    pub salon_id: SalonId,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: String,
}

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" | "accepted" => Ok(Self::Confirmed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(ParseError::InvalidFormat {
                expected: "pending, confirmed, or cancelled".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// A booking as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub salon_id: SalonId,
    pub client_id: ClientId,
    pub external_booking_id: ExternalBookingId,
    pub external_uid: String,
    pub service_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    /// Price in minor currency units
    pub price: i64,
}

/// Booking to be recorded by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub salon_id: SalonId,
    pub client_id: ClientId,
    pub external_booking_id: ExternalBookingId,
    pub external_uid: String,
    pub service_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl NewBooking {
    /// Materialize the stored record.
    ///
    /// Bookings created from provider webhooks are always confirmed and carry
    /// a zero price; billing fills in the price later.
    pub fn into_booking(self, id: BookingId) -> Booking {
        Booking {
            id,
            salon_id: self.salon_id,
            client_id: self.client_id,
            external_booking_id: self.external_booking_id,
            external_uid: self.external_uid,
            service_name: self.service_name,
            start_time: self.start_time,
            end_time: self.end_time,
            status: BookingStatus::Confirmed,
            price: 0,
        }
    }
}

/// Dashboard row combining a booking with its client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: BookingId,
    pub client_name: String,
    pub email: String,
    pub phone: String,
    pub service: String,
    /// `YYYY-MM-DD` in UTC
    pub date: String,
    /// 12-hour clock in UTC, e.g. `10:00 AM`
    pub time: String,
    pub status: BookingStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BookingView {
    pub fn from_records(booking: &Booking, client: &Client) -> Self {
        Self {
            id: booking.id,
            client_name: client.full_name.clone(),
            email: client.email.clone().unwrap_or_default(),
            phone: client.phone.clone(),
            service: booking.service_name.clone(),
            date: booking.start_time.format("%Y-%m-%d").to_string(),
            time: booking.start_time.format("%-I:%M %p").to_string(),
            status: booking.status,
            start_time: booking.start_time,
            end_time: booking.end_time,
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
