use async_trait::async_trait;
use uuid::Uuid;
use vowbook_core::{RepoResult, WriteOutcome};

use crate::models::{Booking, BookingFilter};
use crate::modification::{BookingModification, ModificationStatus};

/// Durable booking storage.
///
/// `update` writes only when the stored version equals `expected_version`;
/// the caller has already bumped `booking.version`.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> RepoResult<()>;

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    async fn update(&self, booking: &Booking, expected_version: u64) -> RepoResult<WriteOutcome>;

    async fn delete(&self, id: Uuid) -> RepoResult<()>;

    /// Newest first. Returns the page and the total match count.
    async fn list(
        &self,
        filter: &BookingFilter,
        offset: u64,
        limit: u32,
    ) -> RepoResult<(Vec<Booking>, u64)>;
}

/// Durable modification storage, with the same optimistic update contract.
#[async_trait]
pub trait ModificationRepository: Send + Sync {
    async fn insert(&self, modification: &BookingModification) -> RepoResult<()>;

    async fn get(&self, id: Uuid) -> RepoResult<Option<BookingModification>>;

    async fn update(
        &self,
        modification: &BookingModification,
        expected_version: u64,
    ) -> RepoResult<WriteOutcome>;

    /// Oldest first.
    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<BookingModification>>;

    async fn list_by_status(&self, status: ModificationStatus) -> RepoResult<Vec<BookingModification>>;
}
