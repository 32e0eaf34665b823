//! # In-Memory Booking Store
//!
//! Thread-safe in-memory implementation for testing and development.
//! A single `RwLock` guards all tables, which makes every upsert atomic.

use super::{BookingStore, RecordedBooking, StoreError, UpsertedClient};
use crate::model::{Booking, BookingView, Client, ClientUpsert, NewBooking, Salon};
use crate::{BookingId, ClientId, ExternalBookingId, SalonId};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::debug;

#[derive(Debug, Default)]
struct Tables {
    /// Keyed by organizer email
    salons: HashMap<String, Salon>,
    clients: HashMap<ClientId, Client>,
    client_keys: HashMap<(SalonId, String), ClientId>,
    bookings: HashMap<ExternalBookingId, Booking>,
}

/// In-memory [`BookingStore`]
///
/// Clones share the same tables.
///
/// # Examples
///
/// ```rust
/// use glowboost_core::{BookingStore, InMemoryBookingStore, Salon, SalonId};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryBookingStore::with_salons([Salon::new(
///     SalonId::new("s1").unwrap(),
///     "owner@salon.example",
/// )])
/// .unwrap();
///
/// let salon = store
///     .find_salon_by_organizer_email("owner@salon.example")
///     .await
///     .unwrap();
/// assert!(salon.is_some());
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryBookingStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store pre-populated with salons
    pub fn with_salons(salons: impl IntoIterator<Item = Salon>) -> Result<Self, StoreError> {
        let store = Self::new();
        for salon in salons {
            store.add_salon(salon)?;
        }
        Ok(store)
    }

    /// Provision a salon; organizer emails and salon IDs must be unique
    pub fn add_salon(&self, salon: Salon) -> Result<(), StoreError> {
        let mut tables = self.write()?;

        if tables.salons.contains_key(&salon.organizer_email) {
            return Err(StoreError::ConstraintViolation {
                message: format!("organizer email '{}' already assigned", salon.organizer_email),
            });
        }
        if tables.salons.values().any(|s| s.id == salon.id) {
            return Err(StoreError::ConstraintViolation {
                message: format!("salon '{}' already exists", salon.id),
            });
        }

        tables.salons.insert(salon.organizer_email.clone(), salon);
        Ok(())
    }

    /// Snapshot of all clients
    pub fn clients(&self) -> Result<Vec<Client>, StoreError> {
        Ok(self.read()?.clients.values().cloned().collect())
    }

    /// Snapshot of all bookings
    pub fn bookings(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.read()?.bookings.values().cloned().collect())
    }

    pub fn client_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.clients.len())
    }

    pub fn booking_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.bookings.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Unavailable {
            message: "in-memory store lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Unavailable {
            message: "in-memory store lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_salon_by_organizer_email(
        &self,
        organizer_email: &str,
    ) -> Result<Option<Salon>, StoreError> {
        Ok(self.read()?.salons.get(organizer_email).cloned())
    }

    async fn upsert_client(&self, upsert: ClientUpsert) -> Result<UpsertedClient, StoreError> {
        let mut tables = self.write()?;
        let key = (upsert.salon_id.clone(), upsert.phone.clone());

        if let Some(existing_id) = tables.client_keys.get(&key).copied() {
            let client = tables
                .clients
                .get_mut(&existing_id)
                .ok_or_else(|| StoreError::CorruptRecord {
                    message: format!("client index points at missing client {existing_id}"),
                })?;
            client.full_name = upsert.full_name;
            client.email = upsert.email;
            debug!(client_id = %existing_id, "Updated existing client");

            return Ok(UpsertedClient {
                client: client.clone(),
                created: false,
            });
        }

        let client = Client {
            id: ClientId::new(),
            salon_id: upsert.salon_id,
            full_name: upsert.full_name,
            email: upsert.email,
            phone: upsert.phone,
        };
        tables.client_keys.insert(key, client.id);
        tables.clients.insert(client.id, client.clone());
        debug!(client_id = %client.id, "Created client");

        Ok(UpsertedClient {
            client,
            created: true,
        })
    }

    async fn record_booking(&self, booking: NewBooking) -> Result<RecordedBooking, StoreError> {
        let mut tables = self.write()?;

        if let Some(existing) = tables.bookings.get(&booking.external_booking_id) {
            return Ok(RecordedBooking {
                booking_id: existing.id,
                inserted: false,
            });
        }

        match tables.clients.get(&booking.client_id) {
            Some(client) if client.salon_id == booking.salon_id => {}
            Some(client) => {
                return Err(StoreError::ConstraintViolation {
                    message: format!(
                        "client {} belongs to salon '{}', not '{}'",
                        client.id, client.salon_id, booking.salon_id
                    ),
                });
            }
            None => {
                return Err(StoreError::ConstraintViolation {
                    message: format!("client {} does not exist", booking.client_id),
                });
            }
        }

        let booking_id = BookingId::new();
        let external_id = booking.external_booking_id;
        tables
            .bookings
            .insert(external_id, booking.into_booking(booking_id));

        Ok(RecordedBooking {
            booking_id,
            inserted: true,
        })
    }

    async fn list_bookings(&self, salon_id: &SalonId) -> Result<Vec<BookingView>, StoreError> {
        let tables = self.read()?;

        let mut rows: Vec<&Booking> = tables
            .bookings
            .values()
            .filter(|b| &b.salon_id == salon_id)
            .collect();
        rows.sort_by_key(|b| (b.start_time, b.external_booking_id));

        rows.into_iter()
            .map(|booking| -> Result<BookingView, StoreError> {
                let client = tables.clients.get(&booking.client_id).ok_or_else(|| {
                    StoreError::CorruptRecord {
                        message: format!("booking {} references missing client", booking.id),
                    }
                })?;
                Ok(BookingView::from_records(booking, client))
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
