use super::*;
use crate::model::BookingStatus;
use chrono::{TimeZone, Utc};

fn salon(id: &str, email: &str) -> Salon {
    Salon::new(SalonId::new(id).unwrap(), email)
}

fn upsert(salon_id: &str, name: &str, phone: &str) -> ClientUpsert {
    ClientUpsert {
        salon_id: SalonId::new(salon_id).unwrap(),
        full_name: name.to_string(),
        email: Some(format!("{}@example.com", name.to_lowercase())),
        phone: phone.to_string(),
    }
}

fn new_booking(client: &Client, external_id: i64, hour: u32) -> NewBooking {
    let start = Utc.with_ymd_and_hms(2024, 12, 10, hour, 0, 0).unwrap();
    NewBooking {
        salon_id: client.salon_id.clone(),
        client_id: client.id,
        external_booking_id: ExternalBookingId::new(external_id),
        external_uid: format!("uid-{external_id}"),
        service_name: "Lash Fill".to_string(),
        start_time: start,
        end_time: start + chrono::Duration::minutes(45),
    }
}

fn seeded() -> InMemoryBookingStore {
    InMemoryBookingStore::with_salons([
        salon("s1", "owner@salon.example"),
        salon("s2", "other@salon.example"),
    ])
    .unwrap()
}

mod salon_tests {
    use super::*;

    #[tokio::test]
    async fn test_find_salon_exact_match() {
        let store = seeded();

        let found = store
            .find_salon_by_organizer_email("owner@salon.example")
            .await
            .unwrap();
        assert_eq!(found.unwrap().id.as_str(), "s1");

        let missing = store
            .find_salon_by_organizer_email("OWNER@salon.example")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_duplicate_organizer_email_rejected() {
        let store = seeded();
        let result = store.add_salon(salon("s3", "owner@salon.example"));
        assert!(matches!(result, Err(StoreError::ConstraintViolation { .. })));
    }

    #[test]
    fn test_duplicate_salon_id_rejected() {
        let store = seeded();
        let result = store.add_salon(salon("s1", "new@salon.example"));
        assert!(matches!(result, Err(StoreError::ConstraintViolation { .. })));
    }
}

mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = seeded();

        let first = store
            .upsert_client(upsert("s1", "Jane", "+15551234567"))
            .await
            .unwrap();
        assert!(first.created);

        let mut changed = upsert("s1", "Janet", "+15551234567");
        changed.email = None;
        let second = store.upsert_client(changed).await.unwrap();

        assert!(!second.created);
        assert_eq!(second.client.id, first.client.id);
        assert_eq!(second.client.full_name, "Janet");
        assert_eq!(second.client.email, None);
        assert_eq!(store.client_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_phone_in_different_salons_is_distinct() {
        let store = seeded();

        let a = store
            .upsert_client(upsert("s1", "Jane", "+15551234567"))
            .await
            .unwrap();
        let b = store
            .upsert_client(upsert("s2", "Jane", "+15551234567"))
            .await
            .unwrap();

        assert!(a.created && b.created);
        assert_ne!(a.client.id, b.client.id);
        assert_eq!(store.client_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_produce_one_client() {
        let store = seeded();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .upsert_client(upsert("s1", &format!("Name{i}"), "+15551234567"))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.client_count().unwrap(), 1);
    }
}

mod booking_tests {
    use super::*;

    #[tokio::test]
    async fn test_record_booking_is_idempotent() {
        let store = seeded();
        let client = store
            .upsert_client(upsert("s1", "Jane", "+15551234567"))
            .await
            .unwrap()
            .client;

        let first = store.record_booking(new_booking(&client, 501, 10)).await.unwrap();
        let second = store.record_booking(new_booking(&client, 501, 11)).await.unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(first.booking_id, second.booking_id);
        assert_eq!(store.booking_count().unwrap(), 1);

        // The original row is untouched by the redelivery.
        let stored = store.bookings().unwrap().pop().unwrap();
        assert_eq!(stored.start_time.format("%H").to_string(), "10");
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.price, 0);
    }

    #[tokio::test]
    async fn test_booking_for_unknown_client_rejected() {
        let store = seeded();
        let ghost = Client {
            id: ClientId::new(),
            salon_id: SalonId::new("s1").unwrap(),
            full_name: "Ghost".to_string(),
            email: None,
            phone: "+1".to_string(),
        };

        let result = store.record_booking(new_booking(&ghost, 1, 9)).await;
        assert!(matches!(result, Err(StoreError::ConstraintViolation { .. })));
        assert_eq!(store.booking_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_booking_salon_must_match_client_salon() {
        let store = seeded();
        let client = store
            .upsert_client(upsert("s1", "Jane", "+15551234567"))
            .await
            .unwrap()
            .client;

        let mut booking = new_booking(&client, 7, 9);
        booking.salon_id = SalonId::new("s2").unwrap();

        let result = store.record_booking(booking).await;
        assert!(matches!(result, Err(StoreError::ConstraintViolation { .. })));
    }

    #[tokio::test]
    async fn test_list_bookings_is_scoped_and_ordered() {
        let store = seeded();
        let jane = store
            .upsert_client(upsert("s1", "Jane", "+15551234567"))
            .await
            .unwrap()
            .client;
        let other = store
            .upsert_client(upsert("s2", "Omar", "+15550000000"))
            .await
            .unwrap()
            .client;

        store.record_booking(new_booking(&jane, 2, 14)).await.unwrap();
        store.record_booking(new_booking(&jane, 1, 9)).await.unwrap();
        store.record_booking(new_booking(&other, 3, 8)).await.unwrap();

        let views = store
            .list_bookings(&SalonId::new("s1").unwrap())
            .await
            .unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].time, "9:00 AM");
        assert_eq!(views[1].time, "2:00 PM");
        assert!(views.iter().all(|v| v.client_name == "Jane"));
    }

    #[tokio::test]
    async fn test_ping_succeeds() {
        assert!(InMemoryBookingStore::new().ping().await.is_ok());
    }
}

mod poisoning_tests {
    use super::*;

    fn poisoned_store() -> InMemoryBookingStore {
        let store = InMemoryBookingStore::new();
        let tables = store.tables.clone();
        let _ = std::thread::spawn(move || {
            let _guard = tables.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        store
    }

    #[test]
    fn test_snapshots_report_poisoned_lock() {
        let store = poisoned_store();

        assert!(matches!(store.client_count(), Err(StoreError::Unavailable { .. })));
        assert!(matches!(store.booking_count(), Err(StoreError::Unavailable { .. })));
        assert!(store.clients().is_err());
        assert!(store.bookings().is_err());
    }

    #[tokio::test]
    async fn test_store_operations_report_poisoned_lock() {
        let store = poisoned_store();

        assert!(store.ping().await.is_err());
        assert!(store.upsert_client(upsert("s1", "Jane", "+1555")).await.is_err());
    }
}
