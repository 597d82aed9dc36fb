//! Runs against a live PostgreSQL. Set `DATABASE_URL` and run with
//! `--ignored`.

use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use uuid::Uuid;
use vowbook_catalog::{AvailabilityRecord, AvailabilityStore, SlotKey, SlotUpdate, TimeSlot};
use vowbook_store::{DbClient, PgAvailabilityStore};

async fn connect() -> DbClient {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = DbClient::new(&url, 10).await.unwrap();
    db.migrate().await.unwrap();
    db
}

fn t(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

#[tokio::test]
#[ignore]
async fn test_pg_reservations_never_exceed_capacity() {
    let db = connect().await;
    let store = Arc::new(PgAvailabilityStore::new(db.pool.clone()));
    let key = SlotKey::new(Uuid::new_v4(), None, NaiveDate::from_ymd_opt(2025, 6, 14).unwrap());
    store
        .put_record(AvailabilityRecord::new(key.clone(), vec![TimeSlot::new(t(16), t(23), 3)]).unwrap())
        .await
        .unwrap();

    let attempts = (0..12).map(|_| {
        let store = store.clone();
        let key = key.clone();
        tokio::spawn(async move { store.reserve_slot(&key, t(16), t(23)).await.unwrap() })
    });
    let outcomes: Vec<SlotUpdate> = futures_util::future::join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 3);
    assert!(outcomes.iter().filter(|o| !o.is_applied()).all(|o| *o == SlotUpdate::Full));

    let record = store.find_record(&key).await.unwrap().unwrap();
    let slot = record.slot(t(16), t(23)).unwrap();
    assert_eq!(slot.current_bookings, 3);
    assert!(!slot.is_available);
}

#[tokio::test]
#[ignore]
async fn test_pg_release_floors_at_zero_and_missing_record_fails_closed() {
    let db = connect().await;
    let store = PgAvailabilityStore::new(db.pool.clone());
    let key = SlotKey::new(Uuid::new_v4(), Some(Uuid::new_v4()), NaiveDate::from_ymd_opt(2025, 7, 5).unwrap());

    assert_eq!(store.reserve_slot(&key, t(16), t(23)).await.unwrap(), SlotUpdate::NoRecord);

    store
        .put_record(AvailabilityRecord::new(key.clone(), vec![TimeSlot::new(t(16), t(23), 1)]).unwrap())
        .await
        .unwrap();
    assert_eq!(store.reserve_slot(&key, t(10), t(12)).await.unwrap(), SlotUpdate::SlotNotFound);

    let released = store.release_slot(&key, t(16), t(23)).await.unwrap();
    match released {
        SlotUpdate::Applied(slot) => assert_eq!(slot.current_bookings, 0),
        other => panic!("unexpected {:?}", other),
    }
}
