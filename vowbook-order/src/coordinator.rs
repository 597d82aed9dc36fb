use chrono::{NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use vowbook_catalog::{
    AvailabilityStore, PriceQuote, PricingEngine, PricingRuleSource, ServiceLine, SlotKey, SlotUpdate,
};
use vowbook_core::notify::dispatch_best_effort;
use vowbook_core::{Caller, CoreError, CoreResult, NotificationDispatcher, Role, WriteOutcome};
use vowbook_shared::models::events::{BookingCancelledEvent, BookingCreatedEvent};
use vowbook_shared::models::DomainEvent;
use vowbook_shared::{Masked, Page};

use crate::models::{
    Booking, BookingFilter, BookingPricing, BookingQuery, BookingSnapshot, BookingStatus,
    CreateBookingRequest, PaymentInfo, PaymentStatus, Schedule,
};
use crate::repository::BookingRepository;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Attempts at a version-checked write before giving up with a conflict.
    pub max_retries: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// Creates, cancels and re-slots bookings.
///
/// Slot counters are only touched through `AvailabilityStore::reserve_slot`
/// and `release_slot`. Booking writes are version-checked and retried.
pub struct BookingCoordinator {
    availability: Arc<dyn AvailabilityStore>,
    pricing_rules: Arc<dyn PricingRuleSource>,
    bookings: Arc<dyn BookingRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    pricing: PricingEngine,
    settings: CoordinatorSettings,
}

impl BookingCoordinator {
    pub fn new(
        availability: Arc<dyn AvailabilityStore>,
        pricing_rules: Arc<dyn PricingRuleSource>,
        bookings: Arc<dyn BookingRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            availability,
            pricing_rules,
            bookings,
            dispatcher,
            pricing: PricingEngine::default(),
            settings: CoordinatorSettings::default(),
        }
    }

    pub fn with_pricing(mut self, pricing: PricingEngine) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn create_booking(&self, caller: &Caller, request: CreateBookingRequest) -> CoreResult<Booking> {
        if caller.role == Role::Vendor {
            return Err(CoreError::Forbidden("vendors cannot create bookings".to_string()));
        }

        // 1. Validate
        let vendor_id = request
            .vendor
            .ok_or_else(|| CoreError::Validation("vendor is required".to_string()))?;
        let services = request
            .services
            .ok_or_else(|| CoreError::Validation("services are required".to_string()))?;
        validate_services(&services)?;
        let schedule = request
            .schedule
            .ok_or_else(|| CoreError::Validation("schedule is required".to_string()))?;
        if schedule.start_time >= schedule.end_time {
            return Err(CoreError::Validation("start_time must be before end_time".to_string()));
        }
        if request.guest_count == Some(0) {
            return Err(CoreError::Validation("guest_count must be positive".to_string()));
        }

        let key = SlotKey::new(vendor_id, request.venue, schedule.date);

        // 2. Check availability
        let check = self
            .availability
            .check_availability(&key, schedule.start_time, schedule.end_time)
            .await
            .map_err(CoreError::internal)?;
        if !check.available {
            tracing::info!("Booking refused for vendor {} on {}: {:?}", vendor_id, schedule.date, check.conflicts);
            return Err(CoreError::Conflict(check.conflicts));
        }

        // 3. Price
        let quote = self.quote(vendor_id, &services, schedule.date, schedule.start_time).await?;

        // 4. Persist as pending
        let now = Utc::now();
        let pricing = BookingPricing::from(quote);
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: caller.id.clone(),
            vendor_id,
            venue_id: request.venue,
            services,
            schedule: Schedule {
                date: schedule.date,
                start_time: schedule.start_time,
                end_time: schedule.end_time,
                duration_minutes: schedule
                    .duration
                    .unwrap_or_else(|| (schedule.end_time - schedule.start_time).num_minutes()),
                timezone: schedule.timezone.unwrap_or_else(|| "UTC".to_string()),
                recurring: schedule.recurring,
            },
            guest_count: request.guest_count,
            payment: PaymentInfo {
                status: PaymentStatus::Pending,
                method: request.payment_method,
                amount: pricing.final_price,
            },
            pricing,
            status: BookingStatus::Pending,
            notes: request.notes,
            is_active: true,
            slot_released: false,
            applied_modifications: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };
        self.bookings.insert(&booking).await.map_err(CoreError::internal)?;

        // 5. Reserve the slot, undoing the insert when that fails
        match self
            .availability
            .reserve_slot(&key, booking.schedule.start_time, booking.schedule.end_time)
            .await
        {
            Ok(SlotUpdate::Applied(slot)) => {
                tracing::debug!(
                    "Reserved slot {}-{} for booking {} ({}/{})",
                    slot.start_time, slot.end_time, booking.id, slot.current_bookings, slot.max_bookings
                );
            }
            Ok(refused) => {
                self.discard(&booking).await;
                let reason = refused.reason().unwrap_or(vowbook_catalog::inventory::SLOT_FULL);
                return Err(CoreError::conflict(reason));
            }
            Err(e) => {
                self.discard(&booking).await;
                return Err(CoreError::internal(e));
            }
        }

        // 6. Notify
        tracing::info!("Booking {} created for vendor {} on {}", booking.id, vendor_id, booking.schedule.date);
        dispatch_best_effort(
            self.dispatcher.as_ref(),
            DomainEvent::BookingCreated(BookingCreatedEvent {
                booking_id: booking.id,
                user_id: booking.user_id.clone(),
                vendor_id,
                venue_id: booking.venue_id,
                date: booking.schedule.date,
                final_price: booking.pricing.final_price,
                currency: booking.pricing.currency.clone(),
                timestamp: now.timestamp(),
            }),
        )
        .await;

        Ok(booking)
    }

    /// Compensation for a booking whose slot could not be reserved.
    async fn discard(&self, booking: &Booking) {
        let Err(e) = self.bookings.delete(booking.id).await else {
            return;
        };
        tracing::error!("Failed to delete unreserved booking {}: {}", booking.id, e);

        let mut orphan = booking.clone();
        let expected = orphan.version;
        orphan.status = BookingStatus::Cancelled;
        orphan.is_active = false;
        orphan.slot_released = true;
        orphan.cancelled_at = Some(Utc::now());
        orphan.touch();
        if let Err(e) = self.bookings.update(&orphan, expected).await {
            tracing::error!("Booking {} left pending without a reserved slot: {}", booking.id, e);
        }
    }

    /// Cancel a booking and give its slot back. Repeated calls are no-ops.
    pub async fn cancel_booking(&self, caller: &Caller, id: Uuid, reason: Option<String>) -> CoreResult<Booking> {
        let booking = self.load(id).await?;
        if !booking.is_party(caller) {
            return Err(CoreError::Forbidden("not a party to this booking".to_string()));
        }

        let (booking, claimed) = self
            .mutate(id, |b| match b.status {
                BookingStatus::Cancelled if b.slot_released => Ok(false),
                BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Cancelled => {
                    b.status = BookingStatus::Cancelled;
                    b.is_active = false;
                    b.slot_released = true;
                    b.cancelled_at.get_or_insert_with(Utc::now);
                    Ok(true)
                }
                other => Err(CoreError::invalid_transition(other, "cancel")),
            })
            .await?;

        if !claimed {
            tracing::debug!("Booking {} already cancelled", id);
            return Ok(booking);
        }

        let key = booking.slot_key();
        match self
            .availability
            .release_slot(&key, booking.schedule.start_time, booking.schedule.end_time)
            .await
        {
            Ok(SlotUpdate::Applied(_)) => {}
            Ok(other) => tracing::warn!("Slot for booking {} not released: {:?}", id, other),
            Err(e) => {
                tracing::error!("Failed to release slot for booking {}: {}", id, e);
                if let Err(revert) = self
                    .mutate(id, |b| {
                        b.slot_released = false;
                        Ok(true)
                    })
                    .await
                {
                    tracing::error!("Could not reopen slot release for booking {}: {}", id, revert);
                }
                return Err(CoreError::internal(e));
            }
        }

        tracing::info!("Booking {} cancelled by {}", id, caller.id);
        dispatch_best_effort(
            self.dispatcher.as_ref(),
            DomainEvent::BookingCancelled(BookingCancelledEvent {
                booking_id: id,
                cancelled_by: caller.id.clone(),
                reason: reason.map(Masked),
                timestamp: Utc::now().timestamp(),
            }),
        )
        .await;

        Ok(booking)
    }

    pub async fn get_booking(&self, caller: &Caller, id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(id).await?;
        if !booking.is_party(caller) {
            return Err(CoreError::Forbidden("not a party to this booking".to_string()));
        }
        Ok(booking)
    }

    /// Load without an authorization check, for collaborating services.
    pub async fn find_booking(&self, id: Uuid) -> CoreResult<Booking> {
        self.load(id).await
    }

    pub async fn list_bookings(&self, caller: &Caller, query: BookingQuery) -> CoreResult<Page<Booking>> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(CoreError::Validation("page must be at least 1".to_string()));
        }
        let limit = query.limit.unwrap_or(self.settings.default_page_size);
        if limit == 0 {
            return Err(CoreError::Validation("limit must be at least 1".to_string()));
        }
        let limit = limit.min(self.settings.max_page_size);

        let mut filter = BookingFilter {
            status: query.status,
            venue_id: query.venue_id,
            vendor_id: query.vendor_id,
            date_from: query.date.or(query.start_date),
            date_to: query.date.or(query.end_date),
            ..Default::default()
        };
        match caller.role {
            Role::Customer => filter.user_id = Some(caller.id.clone()),
            Role::Vendor => {
                let own = Uuid::parse_str(&caller.id)
                    .map_err(|_| CoreError::Auth("vendor identity is not a vendor id".to_string()))?;
                if filter.vendor_id.is_some_and(|v| v != own) {
                    return Err(CoreError::Forbidden("vendors can only list their own bookings".to_string()));
                }
                filter.vendor_id = Some(own);
            }
            Role::Admin => {}
        }

        let (items, total) = self
            .bookings
            .list(&filter, Page::<Booking>::offset(page, limit), limit)
            .await
            .map_err(CoreError::internal)?;
        Ok(Page::new(items, total, page, limit))
    }

    pub async fn quote(
        &self,
        vendor_id: Uuid,
        services: &[ServiceLine],
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> CoreResult<PriceQuote> {
        self.pricing
            .quote(self.pricing_rules.as_ref(), vendor_id, services, date, start_time)
            .await
            .map_err(|e| CoreError::Validation(e.to_string()))
    }

    /// Write an agreed modification onto the booking. Applying the same
    /// modification id twice returns the booking unchanged.
    ///
    /// A move to another slot reserves the new slot before the booking write
    /// and releases the old one after it.
    pub async fn apply_modification(
        &self,
        booking_id: Uuid,
        modification_id: Uuid,
        final_data: &BookingSnapshot,
        pricing: BookingPricing,
    ) -> CoreResult<Booking> {
        let current = self.load(booking_id).await?;
        if current.applied_modifications.contains(&modification_id) {
            return Ok(current);
        }
        if !current.is_active {
            return Err(CoreError::invalid_transition(current.status, "modify the booking"));
        }

        let old_key = current.slot_key();
        let new_key = SlotKey::new(current.vendor_id, final_data.venue_id, final_data.date);
        let moves_slot = old_key != new_key
            || current.schedule.start_time != final_data.start_time
            || current.schedule.end_time != final_data.end_time;

        if moves_slot {
            match self
                .availability
                .reserve_slot(&new_key, final_data.start_time, final_data.end_time)
                .await
                .map_err(CoreError::internal)?
            {
                SlotUpdate::Applied(_) => {}
                refused => {
                    let reason = refused.reason().unwrap_or(vowbook_catalog::inventory::SLOT_FULL);
                    return Err(CoreError::conflict(reason));
                }
            }
        }

        let written = self
            .mutate(booking_id, |b| {
                if b.applied_modifications.contains(&modification_id) {
                    return Ok(false);
                }
                if !b.is_active {
                    return Err(CoreError::invalid_transition(b.status, "modify the booking"));
                }
                b.venue_id = final_data.venue_id;
                b.schedule.date = final_data.date;
                b.schedule.start_time = final_data.start_time;
                b.schedule.end_time = final_data.end_time;
                b.schedule.duration_minutes = (final_data.end_time - final_data.start_time).num_minutes();
                b.guest_count = final_data.guest_count;
                b.services = final_data.services.clone();
                b.pricing = pricing.clone();
                b.payment.amount = pricing.final_price;
                b.applied_modifications.push(modification_id);
                Ok(true)
            })
            .await;

        let (booking, changed) = match written {
            Ok(result) => result,
            Err(e) => {
                if moves_slot {
                    self.release_quietly(&new_key, final_data.start_time, final_data.end_time).await;
                }
                return Err(e);
            }
        };

        if moves_slot {
            if changed {
                self.release_quietly(&old_key, current.schedule.start_time, current.schedule.end_time)
                    .await;
            } else {
                // Someone else applied it first and already holds the new slot.
                self.release_quietly(&new_key, final_data.start_time, final_data.end_time).await;
            }
        }

        if changed {
            tracing::info!("Applied modification {} to booking {}", modification_id, booking_id);
        }
        Ok(booking)
    }

    async fn release_quietly(&self, key: &SlotKey, start_time: NaiveTime, end_time: NaiveTime) {
        if let Err(e) = self.availability.release_slot(key, start_time, end_time).await {
            tracing::error!(
                "Failed to release slot {}-{} for vendor {} on {}: {}",
                start_time, end_time, key.vendor_id, key.date, e
            );
        }
    }

    async fn load(&self, id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get(id)
            .await
            .map_err(CoreError::internal)?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {} not found", id)))
    }

    /// Reload, apply, and write with a version check, retrying on conflict.
    /// `apply` returns `false` when there is nothing to write.
    async fn mutate<F>(&self, id: Uuid, mut apply: F) -> CoreResult<(Booking, bool)>
    where
        F: FnMut(&mut Booking) -> CoreResult<bool> + Send,
    {
        for attempt in 1..=self.settings.max_retries.max(1) {
            let mut booking = self.load(id).await?;
            let expected = booking.version;
            if !apply(&mut booking)? {
                return Ok((booking, false));
            }
            booking.touch();
            match self.bookings.update(&booking, expected).await.map_err(CoreError::internal)? {
                WriteOutcome::Written => return Ok((booking, true)),
                WriteOutcome::VersionConflict => {
                    tracing::debug!("Version conflict on booking {} (attempt {})", id, attempt);
                }
            }
        }
        Err(CoreError::conflict(format!("Booking {} was modified concurrently, retry later", id)))
    }
}

fn validate_services(services: &[ServiceLine]) -> CoreResult<()> {
    if services.is_empty() {
        return Err(CoreError::Validation("at least one service is required".to_string()));
    }
    if services.iter().any(|s| s.quantity == 0) {
        return Err(CoreError::Validation("service quantity must be positive".to_string()));
    }
    if services.iter().any(|s| s.price < 0) {
        return Err(CoreError::Validation("service price must not be negative".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBookingRepository;
    use crate::models::ScheduleRequest;
    use async_trait::async_trait;
    use chrono::Weekday;
    use vowbook_catalog::{
        AvailabilityRecord, InMemoryAvailabilityStore, InMemoryPricingRules, PricingRule, TimeSlot,
    };
    use vowbook_core::{LogDispatcher, RepoResult};

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn saturday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()
    }

    struct Fixture {
        vendor_id: Uuid,
        availability: Arc<InMemoryAvailabilityStore>,
        bookings: Arc<InMemoryBookingRepository>,
        coordinator: Arc<BookingCoordinator>,
    }

    async fn fixture(capacity: u32) -> Fixture {
        let vendor_id = Uuid::new_v4();
        let availability = Arc::new(InMemoryAvailabilityStore::new());
        let record = AvailabilityRecord::new(
            SlotKey::new(vendor_id, None, saturday()),
            vec![TimeSlot::new(t(10), t(14), capacity), TimeSlot::new(t(16), t(23), capacity)],
        )
        .unwrap();
        availability.put_record(record).await.unwrap();

        let rules = Arc::new(InMemoryPricingRules::new());
        rules
            .set_rules(
                vendor_id,
                vec![PricingRule::TimeBased {
                    days_of_week: vec![Weekday::Sat],
                    start_time: t(16),
                    end_time: t(23),
                    multiplier: 1.2,
                    is_active: true,
                }],
            )
            .await;

        let bookings = Arc::new(InMemoryBookingRepository::new());
        let coordinator = Arc::new(BookingCoordinator::new(
            availability.clone(),
            rules,
            bookings.clone(),
            Arc::new(LogDispatcher),
        ));
        Fixture { vendor_id, availability, bookings, coordinator }
    }

    fn request(vendor_id: Uuid, start: u32, end: u32) -> CreateBookingRequest {
        CreateBookingRequest {
            vendor: Some(vendor_id),
            services: Some(vec![
                ServiceLine { service_id: Uuid::new_v4(), quantity: 1, price: 15_000 },
                ServiceLine { service_id: Uuid::new_v4(), quantity: 2, price: 5_000 },
            ]),
            schedule: Some(ScheduleRequest {
                date: saturday(),
                start_time: t(start),
                end_time: t(end),
                duration: None,
                timezone: None,
                recurring: None,
            }),
            guest_count: Some(120),
            ..Default::default()
        }
    }

    async fn current_bookings(f: &Fixture, start: u32, end: u32) -> u32 {
        let record = f
            .availability
            .find_record(&SlotKey::new(f.vendor_id, None, saturday()))
            .await
            .unwrap()
            .unwrap();
        record.slot(t(start), t(end)).unwrap().current_bookings
    }

    #[tokio::test]
    async fn test_create_booking_prices_and_reserves() {
        let f = fixture(2).await;
        let customer = Caller::customer("customer-1");
        let booking = f.coordinator.create_booking(&customer, request(f.vendor_id, 16, 23)).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.user_id, "customer-1");
        assert_eq!(booking.pricing.base_price, 25_000);
        assert_eq!(booking.pricing.total_price, 30_000);
        assert_eq!(booking.pricing.final_price, 34_500);
        assert_eq!(booking.schedule.duration_minutes, 420);
        assert_eq!(current_bookings(&f, 16, 23).await, 1);
    }

    #[tokio::test]
    async fn test_create_booking_validation() {
        let f = fixture(2).await;
        let customer = Caller::customer("customer-1");

        let mut missing_vendor = request(f.vendor_id, 16, 23);
        missing_vendor.vendor = None;
        let mut no_services = request(f.vendor_id, 16, 23);
        no_services.services = Some(vec![]);
        let inverted = request(f.vendor_id, 23, 16);

        for req in [missing_vendor, no_services, inverted] {
            let err = f.coordinator.create_booking(&customer, req).await.unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "{:?}", err);
        }
        assert_eq!(current_bookings(&f, 16, 23).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_date_fails_closed() {
        let f = fixture(2).await;
        let mut req = request(f.vendor_id, 16, 23);
        req.schedule.as_mut().unwrap().date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let err = f.coordinator.create_booking(&Caller::customer("c"), req).await.unwrap_err();
        match err {
            CoreError::Conflict(reasons) => {
                assert_eq!(reasons, vec![vowbook_catalog::inventory::NO_RECORD.to_string()])
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_creates_only_one_wins() {
        let f = fixture(1).await;
        let attempts = (0..8).map(|i| {
            let coordinator = f.coordinator.clone();
            let req = request(f.vendor_id, 16, 23);
            tokio::spawn(async move {
                coordinator.create_booking(&Caller::customer(format!("customer-{}", i)), req).await
            })
        });
        let results: Vec<_> = futures_util::future::join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let won = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results.iter().filter(|r| matches!(r, Err(CoreError::Conflict(_)))).count();
        assert_eq!(won, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(current_bookings(&f, 16, 23).await, 1);

        let (_, total) = f.bookings.list(&BookingFilter::default(), 0, 100).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_cancel_releases_slot_once() {
        let f = fixture(2).await;
        let customer = Caller::customer("customer-1");
        let booking = f.coordinator.create_booking(&customer, request(f.vendor_id, 16, 23)).await.unwrap();
        let other = f.coordinator.create_booking(&Caller::customer("customer-2"), request(f.vendor_id, 16, 23)).await.unwrap();
        assert_eq!(current_bookings(&f, 16, 23).await, 2);

        let cancelled = f.coordinator.cancel_booking(&customer, booking.id, Some("eloped".into())).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(!cancelled.is_active);
        assert!(cancelled.slot_released);
        assert_eq!(current_bookings(&f, 16, 23).await, 1);

        f.coordinator.cancel_booking(&customer, booking.id, None).await.unwrap();
        assert_eq!(current_bookings(&f, 16, 23).await, 1);

        let still_there = f.coordinator.get_booking(&Caller::customer("customer-2"), other.id).await.unwrap();
        assert_eq!(still_there.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_requires_a_party() {
        let f = fixture(2).await;
        let booking = f
            .coordinator
            .create_booking(&Caller::customer("customer-1"), request(f.vendor_id, 16, 23))
            .await
            .unwrap();

        let stranger = Caller::customer("customer-2");
        let err = f.coordinator.cancel_booking(&stranger, booking.id, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let vendor = Caller::vendor(f.vendor_id);
        f.coordinator.cancel_booking(&vendor, booking.id, None).await.unwrap();
        assert_eq!(current_bookings(&f, 16, 23).await, 0);
    }

    #[tokio::test]
    async fn test_listing_is_role_scoped() {
        let f = fixture(5).await;
        let alice = Caller::customer("alice");
        let bob = Caller::customer("bob");
        f.coordinator.create_booking(&alice, request(f.vendor_id, 16, 23)).await.unwrap();
        f.coordinator.create_booking(&alice, request(f.vendor_id, 10, 14)).await.unwrap();
        f.coordinator.create_booking(&bob, request(f.vendor_id, 16, 23)).await.unwrap();

        let own = f.coordinator.list_bookings(&alice, BookingQuery::default()).await.unwrap();
        assert_eq!(own.total, 2);
        assert!(own.items.iter().all(|b| b.user_id == "alice"));

        let vendor = f.coordinator.list_bookings(&Caller::vendor(f.vendor_id), BookingQuery::default()).await.unwrap();
        assert_eq!(vendor.total, 3);

        let other_vendor = f
            .coordinator
            .list_bookings(&Caller::vendor(Uuid::new_v4()), BookingQuery::default())
            .await
            .unwrap();
        assert_eq!(other_vendor.total, 0);

        let paged = f
            .coordinator
            .list_bookings(&Caller::admin("root"), BookingQuery { page: Some(2), limit: Some(2), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(paged.total, 3);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.total_pages, 2);

        let err = f
            .coordinator
            .list_bookings(&alice, BookingQuery { page: Some(0), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_apply_modification_moves_slot_once() {
        let f = fixture(1).await;
        let customer = Caller::customer("customer-1");
        let booking = f.coordinator.create_booking(&customer, request(f.vendor_id, 16, 23)).await.unwrap();

        let mut final_data = booking.snapshot();
        final_data.start_time = t(10);
        final_data.end_time = t(14);
        let quote = f.coordinator.quote(f.vendor_id, &final_data.services, final_data.date, t(10)).await.unwrap();
        let pricing = BookingPricing::from(quote);
        final_data.final_price = pricing.final_price;

        let modification_id = Uuid::new_v4();
        let updated = f
            .coordinator
            .apply_modification(booking.id, modification_id, &final_data, pricing.clone())
            .await
            .unwrap();
        assert_eq!(updated.schedule.start_time, t(10));
        assert_eq!(updated.pricing.final_price, 28_750);
        assert_eq!(current_bookings(&f, 16, 23).await, 0);
        assert_eq!(current_bookings(&f, 10, 14).await, 1);

        let again = f
            .coordinator
            .apply_modification(booking.id, modification_id, &final_data, pricing)
            .await
            .unwrap();
        assert_eq!(again.version, updated.version);
        assert_eq!(current_bookings(&f, 10, 14).await, 1);
    }

    #[tokio::test]
    async fn test_apply_modification_into_full_slot_changes_nothing() {
        let f = fixture(1).await;
        let first = f.coordinator.create_booking(&Caller::customer("a"), request(f.vendor_id, 16, 23)).await.unwrap();
        f.coordinator.create_booking(&Caller::customer("b"), request(f.vendor_id, 10, 14)).await.unwrap();

        let mut final_data = first.snapshot();
        final_data.start_time = t(10);
        final_data.end_time = t(14);
        let err = f
            .coordinator
            .apply_modification(first.id, Uuid::new_v4(), &final_data, first.pricing.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let unchanged = f.coordinator.find_booking(first.id).await.unwrap();
        assert_eq!(unchanged.schedule.start_time, t(16));
        assert_eq!(current_bookings(&f, 16, 23).await, 1);
        assert_eq!(current_bookings(&f, 10, 14).await, 1);
    }

    struct BrokenBookings;

    #[async_trait]
    impl BookingRepository for BrokenBookings {
        async fn insert(&self, _booking: &Booking) -> RepoResult<()> {
            Err("database unavailable".into())
        }
        async fn get(&self, _id: Uuid) -> RepoResult<Option<Booking>> {
            Err("database unavailable".into())
        }
        async fn update(&self, _booking: &Booking, _expected: u64) -> RepoResult<WriteOutcome> {
            Err("database unavailable".into())
        }
        async fn delete(&self, _id: Uuid) -> RepoResult<()> {
            Err("database unavailable".into())
        }
        async fn list(&self, _f: &BookingFilter, _o: u64, _l: u32) -> RepoResult<(Vec<Booking>, u64)> {
            Err("database unavailable".into())
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_and_leaves_slot_untouched() {
        let f = fixture(1).await;
        let coordinator = BookingCoordinator::new(
            f.availability.clone(),
            Arc::new(InMemoryPricingRules::new()),
            Arc::new(BrokenBookings),
            Arc::new(LogDispatcher),
        );
        let err = coordinator
            .create_booking(&Caller::customer("c"), request(f.vendor_id, 16, 23))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
        assert_eq!(current_bookings(&f, 16, 23).await, 0);
    }

    #[tokio::test]
    async fn test_oversized_price_is_a_validation_error() {
        let f = fixture(1).await;
        let mut req = request(f.vendor_id, 16, 23);
        req.services = Some(vec![ServiceLine { service_id: Uuid::new_v4(), quantity: 3, price: i64::MAX / 2 }]);

        let err = f.coordinator.create_booking(&Caller::customer("c"), req).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(current_bookings(&f, 16, 23).await, 0);
        let (_, total) = f.bookings.list(&BookingFilter::default(), 0, 10).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_zero_retry_setting_still_writes_once() {
        let f = fixture(1).await;
        let coordinator = BookingCoordinator::new(
            f.availability.clone(),
            Arc::new(InMemoryPricingRules::new()),
            f.bookings.clone(),
            Arc::new(LogDispatcher),
        )
        .with_settings(CoordinatorSettings { max_retries: 0, ..Default::default() });
        let customer = Caller::customer("c");
        let booking = coordinator.create_booking(&customer, request(f.vendor_id, 16, 23)).await.unwrap();

        let cancelled = coordinator.cancel_booking(&customer, booking.id, None).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(current_bookings(&f, 16, 23).await, 0);
    }
}
