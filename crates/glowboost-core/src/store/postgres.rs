//! # PostgreSQL Booking Store
//!
//! [`BookingStore`] backed by PostgreSQL through `sqlx`.
//!
//! Atomicity comes from the unique constraints in `migrations/0001_init.sql`:
//! client upserts use `ON CONFLICT (salon_id, phone) DO UPDATE` and booking
//! inserts use `ON CONFLICT (external_booking_id) DO NOTHING`, so concurrent
//! deliveries converge on a single row without application-level locking.

use super::{BookingStore, RecordedBooking, StoreError, UpsertedClient};
use crate::model::{Booking, BookingStatus, BookingView, Client, ClientUpsert, NewBooking, Salon};
use crate::{BookingId, ClientId, ExternalBookingId, SalonId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Schema applied by [`PostgresBookingStore::run_migrations`]
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// PostgreSQL-backed [`BookingStore`]
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Connect a new pool
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and constraints if they do not exist
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        info!("Database schema is up to date");
        Ok(())
    }

    /// Provision a salon
    pub async fn add_salon(&self, salon: &Salon) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO salons (id, organizer_email) VALUES ($1, $2)")
            .bind(salon.id.as_str())
            .bind(&salon.organizer_email)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn find_salon_by_organizer_email(
        &self,
        organizer_email: &str,
    ) -> Result<Option<Salon>, StoreError> {
        let row = sqlx::query("SELECT id, organizer_email FROM salons WHERE organizer_email = $1")
            .bind(organizer_email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| -> Result<Salon, StoreError> {
            let id: String = row.try_get("id").map_err(map_sqlx_error)?;
            Ok(Salon {
                id: salon_id(id)?,
                organizer_email: row.try_get("organizer_email").map_err(map_sqlx_error)?,
            })
        })
        .transpose()
    }

    async fn upsert_client(&self, upsert: ClientUpsert) -> Result<UpsertedClient, StoreError> {
        // xmax is zero only for rows created by this statement.
        let row = sqlx::query(
            r#"
            INSERT INTO clients (id, salon_id, full_name, email, phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (salon_id, phone) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                email = EXCLUDED.email
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(ClientId::new().as_uuid())
        .bind(upsert.salon_id.as_str())
        .bind(&upsert.full_name)
        .bind(upsert.email.as_deref())
        .bind(&upsert.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let id: Uuid = row.try_get("id").map_err(map_sqlx_error)?;
        let created: bool = row.try_get("inserted").map_err(map_sqlx_error)?;
        debug!(client_id = %id, created, "Upserted client");

        Ok(UpsertedClient {
            client: Client {
                id: ClientId::from_uuid(id),
                salon_id: upsert.salon_id,
                full_name: upsert.full_name,
                email: upsert.email,
                phone: upsert.phone,
            },
            created,
        })
    }

    async fn record_booking(&self, booking: NewBooking) -> Result<RecordedBooking, StoreError> {
        let new_id = BookingId::new();
        let stored = booking.into_booking(new_id);

        // The SELECT only yields a row when the client belongs to the salon.
        let inserted = sqlx::query(
            r#"
            INSERT INTO bookings (
                id, salon_id, client_id, external_booking_id, external_uid,
                service_name, start_time, end_time, status, price
            )
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            FROM clients c
            WHERE c.id = $3 AND c.salon_id = $2
            ON CONFLICT (external_booking_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(stored.id.as_uuid())
        .bind(stored.salon_id.as_str())
        .bind(stored.client_id.as_uuid())
        .bind(stored.external_booking_id.as_i64())
        .bind(&stored.external_uid)
        .bind(&stored.service_name)
        .bind(stored.start_time)
        .bind(stored.end_time)
        .bind(stored.status.as_str())
        .bind(stored.price)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if inserted.is_some() {
            return Ok(RecordedBooking {
                booking_id: new_id,
                inserted: true,
            });
        }

        let existing = sqlx::query("SELECT id FROM bookings WHERE external_booking_id = $1")
            .bind(stored.external_booking_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match existing {
            Some(row) => {
                let id: Uuid = row.try_get("id").map_err(map_sqlx_error)?;
                Ok(RecordedBooking {
                    booking_id: BookingId::from_uuid(id),
                    inserted: false,
                })
            }
            None => Err(StoreError::ConstraintViolation {
                message: format!(
                    "client {} does not belong to salon '{}'",
                    stored.client_id, stored.salon_id
                ),
            }),
        }
    }

    async fn list_bookings(&self, salon_id: &SalonId) -> Result<Vec<BookingView>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.client_id, b.external_booking_id, b.external_uid,
                   b.service_name, b.start_time, b.end_time, b.status, b.price,
                   c.full_name, c.email, c.phone
            FROM bookings b
            JOIN clients c ON c.id = b.client_id
            WHERE b.salon_id = $1
            ORDER BY b.start_time, b.external_booking_id
            "#,
        )
        .bind(salon_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| -> Result<BookingView, StoreError> {
                let status: String = row.try_get("status").map_err(map_sqlx_error)?;
                let status: BookingStatus =
                    status.parse().map_err(|e| StoreError::CorruptRecord {
                        message: format!("{e}"),
                    })?;
                let client_id =
                    ClientId::from_uuid(row.try_get("client_id").map_err(map_sqlx_error)?);

                let booking = Booking {
                    id: BookingId::from_uuid(row.try_get("id").map_err(map_sqlx_error)?),
                    salon_id: salon_id.clone(),
                    client_id,
                    external_booking_id: ExternalBookingId::new(
                        row.try_get("external_booking_id").map_err(map_sqlx_error)?,
                    ),
                    external_uid: row.try_get("external_uid").map_err(map_sqlx_error)?,
                    service_name: row.try_get("service_name").map_err(map_sqlx_error)?,
                    start_time: row
                        .try_get::<DateTime<Utc>, _>("start_time")
                        .map_err(map_sqlx_error)?,
                    end_time: row
                        .try_get::<DateTime<Utc>, _>("end_time")
                        .map_err(map_sqlx_error)?,
                    status,
                    price: row.try_get("price").map_err(map_sqlx_error)?,
                };
                let client = Client {
                    id: client_id,
                    salon_id: salon_id.clone(),
                    full_name: row.try_get("full_name").map_err(map_sqlx_error)?,
                    email: row.try_get("email").map_err(map_sqlx_error)?,
                    phone: row.try_get("phone").map_err(map_sqlx_error)?,
                };

                Ok(BookingView::from_records(&booking, &client))
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn salon_id(raw: String) -> Result<SalonId, StoreError> {
    SalonId::new(raw).map_err(|e| StoreError::CorruptRecord {
        message: e.to_string(),
    })
}

/// Classify driver errors without leaking them past the store boundary
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                || db.is_foreign_key_violation()
                || db.is_check_violation() =>
        {
            StoreError::ConstraintViolation {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable {
                message: err.to_string(),
            }
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StoreError::CorruptRecord {
            message: err.to_string(),
        },
        _ => StoreError::OperationFailed {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
