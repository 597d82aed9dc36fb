use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use vowbook_core::RepoResult;

pub const NO_RECORD: &str = "No availability found for this vendor and date";
pub const SLOT_NOT_FOUND: &str = "Requested time slot not found";
pub const SLOT_FULL: &str = "Time slot is fully booked";
pub const SLOT_BLOCKED: &str = "Time slot is not available";

/// Identifies one availability record: a vendor, optionally at a venue, on a date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub vendor_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub date: NaiveDate,
}

impl SlotKey {
    pub fn new(vendor_id: Uuid, venue_id: Option<Uuid>, date: NaiveDate) -> Self {
        Self { vendor_id, venue_id, date }
    }
}

/// A bookable interval with a concurrent-booking capacity.
///
/// `is_available` always equals `current_bookings < max_bookings`; only
/// `try_increment` and `decrement` change the counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(with = "crate::clock")]
    pub start_time: NaiveTime,
    #[serde(with = "crate::clock")]
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub current_bookings: u32,
    pub max_bookings: u32,
    /// Closed by the vendor regardless of remaining capacity.
    #[serde(default)]
    pub blocked: bool,
}

impl TimeSlot {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime, max_bookings: u32) -> Self {
        Self {
            start_time,
            end_time,
            is_available: max_bookings > 0,
            current_bookings: 0,
            max_bookings,
            blocked: false,
        }
    }

    pub fn matches(&self, start_time: NaiveTime, end_time: NaiveTime) -> bool {
        self.start_time == start_time && self.end_time == end_time
    }

    /// Increment only if below capacity.
    pub fn try_increment(&mut self) -> SlotUpdate {
        if self.blocked {
            return SlotUpdate::Blocked;
        }
        if self.current_bookings >= self.max_bookings {
            return SlotUpdate::Full;
        }
        self.current_bookings += 1;
        self.is_available = self.current_bookings < self.max_bookings;
        SlotUpdate::Applied(self.clone())
    }

    /// Decrement with a floor of zero.
    pub fn decrement(&mut self) -> SlotUpdate {
        self.current_bookings = self.current_bookings.saturating_sub(1);
        self.is_available = self.current_bookings < self.max_bookings;
        SlotUpdate::Applied(self.clone())
    }

    /// Re-establish the counter invariant on externally supplied data.
    fn normalize(&mut self) {
        self.current_bookings = self.current_bookings.min(self.max_bookings);
        self.is_available = self.current_bookings < self.max_bookings;
    }

    fn refusal(&self) -> Option<&'static str> {
        if self.blocked {
            Some(SLOT_BLOCKED)
        } else if !self.is_available {
            Some(SLOT_FULL)
        } else {
            None
        }
    }
}

/// All time slots for one vendor/venue/date, ordered by start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub key: SlotKey,
    pub slots: Vec<TimeSlot>,
}

impl AvailabilityRecord {
    pub fn new(key: SlotKey, slots: Vec<TimeSlot>) -> Result<Self, InventoryError> {
        let mut slots = slots;
        for slot in &mut slots {
            if slot.start_time >= slot.end_time {
                return Err(InventoryError::InvalidSlot(format!(
                    "{} must start before it ends ({})",
                    slot.start_time, slot.end_time
                )));
            }
            slot.normalize();
        }
        slots.sort_by_key(|s| (s.start_time, s.end_time));
        if slots
            .windows(2)
            .any(|w| w[0].start_time == w[1].start_time && w[0].end_time == w[1].end_time)
        {
            return Err(InventoryError::InvalidSlot("duplicate time slot".to_string()));
        }
        Ok(Self { key, slots })
    }

    pub fn slot(&self, start_time: NaiveTime, end_time: NaiveTime) -> Option<&TimeSlot> {
        self.slots.iter().find(|s| s.matches(start_time, end_time))
    }

    fn slot_mut(&mut self, start_time: NaiveTime, end_time: NaiveTime) -> Option<&mut TimeSlot> {
        self.slots.iter_mut().find(|s| s.matches(start_time, end_time))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    pub available: bool,
    pub conflicts: Vec<String>,
}

impl AvailabilityCheck {
    fn open() -> Self {
        Self { available: true, conflicts: Vec::new() }
    }

    fn refused(reason: &str) -> Self {
        Self { available: false, conflicts: vec![reason.to_string()] }
    }
}

/// Fails closed: anything but a matching open slot is unavailable.
pub fn evaluate(
    record: Option<&AvailabilityRecord>,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> AvailabilityCheck {
    let Some(record) = record else {
        return AvailabilityCheck::refused(NO_RECORD);
    };
    match record.slot(start_time, end_time) {
        None => AvailabilityCheck::refused(SLOT_NOT_FOUND),
        Some(slot) => match slot.refusal() {
            Some(reason) => AvailabilityCheck::refused(reason),
            None => AvailabilityCheck::open(),
        },
    }
}

/// Outcome of an atomic counter update.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotUpdate {
    Applied(TimeSlot),
    Full,
    Blocked,
    SlotNotFound,
    NoRecord,
}

impl SlotUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, SlotUpdate::Applied(_))
    }

    pub fn reason(&self) -> Option<&'static str> {
        match self {
            SlotUpdate::Applied(_) => None,
            SlotUpdate::Full => Some(SLOT_FULL),
            SlotUpdate::Blocked => Some(SLOT_BLOCKED),
            SlotUpdate::SlotNotFound => Some(SLOT_NOT_FOUND),
            SlotUpdate::NoRecord => Some(NO_RECORD),
        }
    }
}

/// Owner of slot counters. Implementations must perform `reserve_slot` and
/// `release_slot` as one atomic conditional update each, never as a separate
/// read followed by a write.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn find_record(&self, key: &SlotKey) -> RepoResult<Option<AvailabilityRecord>>;

    /// Vendor setup: create or replace a record.
    async fn put_record(&self, record: AvailabilityRecord) -> RepoResult<()>;

    async fn reserve_slot(
        &self,
        key: &SlotKey,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepoResult<SlotUpdate>;

    async fn release_slot(
        &self,
        key: &SlotKey,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepoResult<SlotUpdate>;

    async fn check_availability(
        &self,
        key: &SlotKey,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepoResult<AvailabilityCheck> {
        let record = self.find_record(key).await?;
        Ok(evaluate(record.as_ref(), start_time, end_time))
    }
}

/// In-process availability store. Every counter update happens under a single
/// write-lock acquisition.
pub struct InMemoryAvailabilityStore {
    records: RwLock<HashMap<SlotKey, AvailabilityRecord>>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    async fn update_slot<F>(
        &self,
        key: &SlotKey,
        start_time: NaiveTime,
        end_time: NaiveTime,
        apply: F,
    ) -> SlotUpdate
    where
        F: FnOnce(&mut TimeSlot) -> SlotUpdate,
    {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(key) else {
            return SlotUpdate::NoRecord;
        };
        match record.slot_mut(start_time, end_time) {
            Some(slot) => apply(slot),
            None => SlotUpdate::SlotNotFound,
        }
    }
}

impl Default for InMemoryAvailabilityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn find_record(&self, key: &SlotKey) -> RepoResult<Option<AvailabilityRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put_record(&self, record: AvailabilityRecord) -> RepoResult<()> {
        self.records.write().await.insert(record.key.clone(), record);
        Ok(())
    }

    async fn reserve_slot(
        &self,
        key: &SlotKey,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepoResult<SlotUpdate> {
        Ok(self.update_slot(key, start_time, end_time, TimeSlot::try_increment).await)
    }

    async fn release_slot(
        &self,
        key: &SlotKey,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> RepoResult<SlotUpdate> {
        Ok(self.update_slot(key, start_time, end_time, TimeSlot::decrement).await)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Invalid time slot: {0}")]
    InvalidSlot(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn key() -> SlotKey {
        SlotKey::new(Uuid::new_v4(), None, NaiveDate::from_ymd_opt(2025, 6, 14).unwrap())
    }

    async fn seeded(max: u32) -> (InMemoryAvailabilityStore, SlotKey) {
        let store = InMemoryAvailabilityStore::new();
        let key = key();
        let record = AvailabilityRecord::new(key.clone(), vec![TimeSlot::new(at(16), at(23), max)]).unwrap();
        store.put_record(record).await.unwrap();
        (store, key)
    }

    fn assert_invariant(slot: &TimeSlot) {
        assert!(slot.current_bookings <= slot.max_bookings);
        assert_eq!(slot.is_available, slot.current_bookings < slot.max_bookings);
    }

    #[tokio::test]
    async fn test_missing_record_fails_closed() {
        let store = InMemoryAvailabilityStore::new();
        let check = store.check_availability(&key(), at(16), at(23)).await.unwrap();
        assert_eq!(
            check,
            AvailabilityCheck {
                available: false,
                conflicts: vec!["No availability found for this vendor and date".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_slot_is_unavailable() {
        let (store, key) = seeded(2).await;
        let check = store.check_availability(&key, at(10), at(12)).await.unwrap();
        assert!(!check.available);
        assert_eq!(check.conflicts, vec![SLOT_NOT_FOUND.to_string()]);
    }

    #[tokio::test]
    async fn test_reserve_until_full_then_release() {
        let (store, key) = seeded(2).await;

        for _ in 0..2 {
            let update = store.reserve_slot(&key, at(16), at(23)).await.unwrap();
            let SlotUpdate::Applied(slot) = update else { panic!("expected reservation") };
            assert_invariant(&slot);
        }
        assert_eq!(store.reserve_slot(&key, at(16), at(23)).await.unwrap(), SlotUpdate::Full);

        let check = store.check_availability(&key, at(16), at(23)).await.unwrap();
        assert_eq!(check.conflicts, vec![SLOT_FULL.to_string()]);

        let SlotUpdate::Applied(slot) = store.release_slot(&key, at(16), at(23)).await.unwrap() else {
            panic!("expected release")
        };
        assert_eq!(slot.current_bookings, 1);
        assert!(slot.is_available);
    }

    #[tokio::test]
    async fn test_release_floors_at_zero() {
        let (store, key) = seeded(1).await;
        store.release_slot(&key, at(16), at(23)).await.unwrap();
        let record = store.find_record(&key).await.unwrap().unwrap();
        assert_eq!(record.slots[0].current_bookings, 0);
        assert_invariant(&record.slots[0]);
    }

    #[tokio::test]
    async fn test_blocked_slot_refuses() {
        let store = InMemoryAvailabilityStore::new();
        let key = key();
        let mut slot = TimeSlot::new(at(10), at(14), 3);
        slot.blocked = true;
        store.put_record(AvailabilityRecord::new(key.clone(), vec![slot]).unwrap()).await.unwrap();

        let check = store.check_availability(&key, at(10), at(14)).await.unwrap();
        assert_eq!(check.conflicts, vec![SLOT_BLOCKED.to_string()]);
        assert_eq!(store.reserve_slot(&key, at(10), at(14)).await.unwrap(), SlotUpdate::Blocked);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_overbook() {
        let (store, key) = seeded(3).await;
        let store = Arc::new(store);

        let attempts = (0..20).map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.reserve_slot(&key, at(16), at(23)).await.unwrap() })
        });
        let results = futures_util::future::join_all(attempts).await;

        let applied = results.iter().filter(|r| r.as_ref().unwrap().is_applied()).count();
        assert_eq!(applied, 3);
        let record = store.find_record(&key).await.unwrap().unwrap();
        assert_eq!(record.slots[0].current_bookings, 3);
        assert_invariant(&record.slots[0]);
    }

    #[test]
    fn test_record_rejects_inverted_slot() {
        let result = AvailabilityRecord::new(key(), vec![TimeSlot::new(at(18), at(12), 1)]);
        assert!(matches!(result, Err(InventoryError::InvalidSlot(_))));
    }

    #[test]
    fn test_record_normalizes_counters() {
        let mut slot = TimeSlot::new(at(9), at(12), 2);
        slot.current_bookings = 5;
        let record = AvailabilityRecord::new(key(), vec![slot]).unwrap();
        assert_eq!(record.slots[0].current_bookings, 2);
        assert!(!record.slots[0].is_available);
    }
}
