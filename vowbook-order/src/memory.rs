//! In-process repositories. Each write holds the map's write lock for the
//! whole compare-and-swap.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use vowbook_core::{RepoResult, WriteOutcome};

use crate::models::{Booking, BookingFilter};
use crate::modification::{BookingModification, ModificationStatus};
use crate::repository::{BookingRepository, ModificationRepository};

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> RepoResult<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(format!("booking {} already exists", booking.id).into());
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn update(&self, booking: &Booking, expected_version: u64) -> RepoResult<WriteOutcome> {
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(&booking.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = booking.clone();
                Ok(WriteOutcome::Written)
            }
            Some(_) => Ok(WriteOutcome::VersionConflict),
            None => Err(format!("booking {} does not exist", booking.id).into()),
        }
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        self.bookings.write().await.remove(&id);
        Ok(())
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        offset: u64,
        limit: u32,
    ) -> RepoResult<(Vec<Booking>, u64)> {
        let bookings = self.bookings.read().await;
        let mut matching: Vec<&Booking> = bookings.values().filter(|b| filter.matches(b)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

#[derive(Default)]
pub struct InMemoryModificationRepository {
    modifications: RwLock<HashMap<Uuid, BookingModification>>,
}

impl InMemoryModificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModificationRepository for InMemoryModificationRepository {
    async fn insert(&self, modification: &BookingModification) -> RepoResult<()> {
        let mut modifications = self.modifications.write().await;
        if modifications.contains_key(&modification.id) {
            return Err(format!("modification {} already exists", modification.id).into());
        }
        modifications.insert(modification.id, modification.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<BookingModification>> {
        Ok(self.modifications.read().await.get(&id).cloned())
    }

    async fn update(
        &self,
        modification: &BookingModification,
        expected_version: u64,
    ) -> RepoResult<WriteOutcome> {
        let mut modifications = self.modifications.write().await;
        match modifications.get_mut(&modification.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = modification.clone();
                Ok(WriteOutcome::Written)
            }
            Some(_) => Ok(WriteOutcome::VersionConflict),
            None => Err(format!("modification {} does not exist", modification.id).into()),
        }
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<BookingModification>> {
        let modifications = self.modifications.read().await;
        let mut found: Vec<BookingModification> = modifications
            .values()
            .filter(|m| m.booking_id == booking_id)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    async fn list_by_status(&self, status: ModificationStatus) -> RepoResult<Vec<BookingModification>> {
        let modifications = self.modifications.read().await;
        let mut found: Vec<BookingModification> = modifications
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }
}
