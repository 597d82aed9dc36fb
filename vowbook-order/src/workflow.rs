use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use vowbook_core::notify::dispatch_best_effort;
use vowbook_core::{Caller, CoreError, CoreResult, NotificationDispatcher, WriteOutcome};
use vowbook_shared::models::events::ModificationEvent;
use vowbook_shared::models::DomainEvent;
use vowbook_shared::Masked;

use crate::coordinator::BookingCoordinator;
use crate::models::{Booking, BookingPricing, BookingSnapshot};
use crate::modification::{
    ActorType, BookingModification, CounterOfferInput, CustomerDecision, ModificationChange, ModificationStatus,
    VendorDecision,
};
use crate::repository::ModificationRepository;

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub counter_offer_ttl: Duration,
    pub max_retries: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            counter_offer_ttl: Duration::hours(72),
            max_retries: 5,
        }
    }
}

/// Runs the negotiation over post-booking changes.
///
/// Each transition reloads the record, re-validates its status and writes it
/// back with a version check, so near-simultaneous responses are serialized
/// per modification. Booking changes go through the coordinator.
pub struct ModificationWorkflow {
    modifications: Arc<dyn ModificationRepository>,
    coordinator: Arc<BookingCoordinator>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    settings: WorkflowSettings,
}

impl ModificationWorkflow {
    pub fn new(
        modifications: Arc<dyn ModificationRepository>,
        coordinator: Arc<BookingCoordinator>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            modifications,
            coordinator,
            dispatcher,
            settings: WorkflowSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn request_modification(
        &self,
        caller: &Caller,
        booking_id: Uuid,
        change: ModificationChange,
        reason: String,
    ) -> CoreResult<BookingModification> {
        let booking = self.coordinator.find_booking(booking_id).await?;
        if !booking.is_party(caller) {
            return Err(CoreError::Forbidden("not a party to this booking".to_string()));
        }
        if !booking.is_active {
            return Err(CoreError::invalid_transition(booking.status, "request a modification"));
        }
        if reason.trim().is_empty() {
            return Err(CoreError::Validation("reason is required".to_string()));
        }

        let modification = BookingModification::new(&booking, caller, change, reason, Utc::now())?;
        self.modifications
            .insert(&modification)
            .await
            .map_err(CoreError::internal)?;

        tracing::info!(
            "Modification {} ({:?}) requested on booking {} by {}",
            modification.id,
            modification.modification_type(),
            booking_id,
            caller.id
        );
        self.notify(&modification).await;
        Ok(modification)
    }

    pub async fn vendor_respond(
        &self,
        caller: &Caller,
        id: Uuid,
        decision: VendorDecision,
        message: String,
        counter_offer: Option<CounterOfferInput>,
    ) -> CoreResult<BookingModification> {
        let (_, booking) = self.load_with_booking(id).await?;
        if !(caller.is_vendor(booking.vendor_id) || caller.is_admin()) {
            return Err(CoreError::Forbidden("only the booked vendor can respond".to_string()));
        }

        let ttl = self.settings.counter_offer_ttl;
        let modification = self
            .transition(id, |m, now| {
                m.vendor_respond(caller, decision, message.clone(), counter_offer.clone(), ttl, now)
            })
            .await?;
        self.notify(&modification).await;
        Ok(modification)
    }

    /// Customer's answer to a counter-offer. An expired offer is cancelled
    /// and the answer refused.
    pub async fn customer_respond(
        &self,
        caller: &Caller,
        id: Uuid,
        decision: CustomerDecision,
        message: String,
    ) -> CoreResult<BookingModification> {
        let (current, booking) = self.load_with_booking(id).await?;
        if !(booking.is_owner(caller) || caller.is_admin()) {
            return Err(CoreError::Forbidden("only the booking owner can respond".to_string()));
        }

        let now = Utc::now();
        if current.counter_offer_expired(now) {
            if let Some(expired) = self.expire_one(id, now).await? {
                self.notify(&expired).await;
            }
            return Err(CoreError::invalid_transition("counter_offer expired", "respond as customer"));
        }

        let modification = self
            .transition(id, |m, now| m.customer_respond(caller, decision, message.clone(), now))
            .await?;
        self.notify(&modification).await;
        Ok(modification)
    }

    pub async fn approve_modification(
        &self,
        caller: &Caller,
        id: Uuid,
        notes: Option<String>,
    ) -> CoreResult<BookingModification> {
        require_admin(caller)?;
        let modification = self
            .transition(id, |m, now| m.approve(caller, notes.clone(), now))
            .await?;
        self.notify(&modification).await;
        Ok(modification)
    }

    pub async fn reject_modification(
        &self,
        caller: &Caller,
        id: Uuid,
        reason: String,
    ) -> CoreResult<BookingModification> {
        require_admin(caller)?;
        let modification = self
            .transition(id, |m, now| m.reject(caller, reason.clone(), now))
            .await?;
        self.notify(&modification).await;
        Ok(modification)
    }

    pub async fn add_message(
        &self,
        caller: &Caller,
        id: Uuid,
        message: String,
        attachments: Vec<String>,
    ) -> CoreResult<BookingModification> {
        let (_, booking) = self.load_with_booking(id).await?;
        if !booking.is_party(caller) {
            return Err(CoreError::Forbidden("not a party to this booking".to_string()));
        }

        let modification = self
            .transition(id, |m, now| m.add_message(caller, message.clone(), attachments.clone(), now))
            .await?;

        if let Some(last) = modification.communication.messages.last() {
            dispatch_best_effort(
                self.dispatcher.as_ref(),
                DomainEvent::ModificationMessage(ModificationEvent {
                    modification_id: modification.id,
                    booking_id: modification.booking_id,
                    status: modification.status.to_string(),
                    actor: last.sender.clone(),
                    actor_type: last.sender_type.as_str().to_string(),
                    notes: Some(Masked(last.message.clone())),
                    timestamp: last.sent_at.timestamp(),
                }),
            )
            .await;
        }
        Ok(modification)
    }

    /// The requester withdraws before the change is agreed. Once the booking
    /// is no longer active an agreed change can be withdrawn too.
    pub async fn cancel_modification(
        &self,
        caller: &Caller,
        id: Uuid,
        reason: Option<String>,
    ) -> CoreResult<BookingModification> {
        let (current, booking) = self.load_with_booking(id).await?;
        if !(current.requested_by == caller.id || caller.is_admin()) {
            return Err(CoreError::Forbidden("only the requester can withdraw a modification".to_string()));
        }
        let modification = if booking.is_active {
            self.transition(id, |m, now| m.cancel(caller, reason.clone(), now)).await?
        } else {
            let notes = reason.unwrap_or_else(|| format!("Booking is {}", booking.status));
            self.transition(id, |m, now| m.close(&caller.id, ActorType::of(caller), notes.clone(), now))
                .await?
        };
        self.notify(&modification).await;
        Ok(modification)
    }

    /// Cancel the booking, then close every modification still open on it.
    pub async fn cancel_booking(&self, caller: &Caller, booking_id: Uuid, reason: Option<String>) -> CoreResult<Booking> {
        let booking = self.coordinator.cancel_booking(caller, booking_id, reason).await?;
        if let Err(e) = self.close_open(booking_id).await {
            tracing::warn!("Could not close open modifications of booking {}: {}", booking_id, e);
        }
        Ok(booking)
    }

    /// Apply an approved or accepted modification to its booking.
    ///
    /// The booking write is idempotent per modification id, so a retry after
    /// a failed final transition does not apply the change twice.
    pub async fn implement(&self, caller: &Caller, id: Uuid) -> CoreResult<BookingModification> {
        let (current, booking) = self.load_with_booking(id).await?;
        if !(caller.is_vendor(booking.vendor_id) || caller.is_admin()) {
            return Err(CoreError::Forbidden("only the booked vendor can implement a modification".to_string()));
        }
        let (change, adjustment) = current.agreed_change()?;
        let change = change.clone();
        let cancels_booking = matches!(change, ModificationChange::Cancellation);

        let final_data = match change {
            ModificationChange::Cancellation => {
                self.coordinator
                    .cancel_booking(caller, booking.id, Some(current.reason.clone()))
                    .await?;
                BookingSnapshot { final_price: 0, ..booking.snapshot() }
            }
            change => {
                let mut final_data = change.apply_to(&booking.snapshot());
                let quote = self
                    .coordinator
                    .quote(booking.vendor_id, &final_data.services, final_data.date, final_data.start_time)
                    .await?;
                let mut pricing = BookingPricing::from(quote);
                pricing.adjust("Counter-offer adjustment", adjustment)?;
                final_data.final_price = pricing.final_price;
                self.coordinator
                    .apply_modification(booking.id, id, &final_data, pricing)
                    .await?;
                final_data
            }
        };

        let modification = self
            .transition(id, |m, now| m.complete(caller, final_data.clone(), now))
            .await?;
        if cancels_booking {
            if let Err(e) = self.close_open(booking.id).await {
                tracing::warn!("Could not close open modifications of booking {}: {}", booking.id, e);
            }
        }
        tracing::info!(
            "Modification {} implemented on booking {} (price difference {})",
            id,
            modification.booking_id,
            modification.price_impact.price_difference
        );
        self.notify(&modification).await;
        Ok(modification)
    }

    /// Cancel every counter-offer left unanswered past its expiry. Returns
    /// how many were cancelled.
    pub async fn expire_counter_offers(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let waiting = self
            .modifications
            .list_by_status(ModificationStatus::CustomerResponsePending)
            .await
            .map_err(CoreError::internal)?;

        let mut expired = 0;
        for candidate in waiting.iter().filter(|m| m.counter_offer_expired(now)) {
            match self.expire_one(candidate.id, now).await {
                Ok(Some(modification)) => {
                    expired += 1;
                    self.notify(&modification).await;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Could not expire modification {}: {}", candidate.id, e),
            }
        }
        if expired > 0 {
            tracing::info!("Expired {} counter-offers", expired);
        }
        Ok(expired)
    }

    pub async fn get_modification(&self, caller: &Caller, id: Uuid) -> CoreResult<BookingModification> {
        let (modification, booking) = self.load_with_booking(id).await?;
        if !booking.is_party(caller) {
            return Err(CoreError::Forbidden("not a party to this booking".to_string()));
        }
        Ok(modification)
    }

    pub async fn list_for_booking(&self, caller: &Caller, booking_id: Uuid) -> CoreResult<Vec<BookingModification>> {
        let booking = self.coordinator.find_booking(booking_id).await?;
        if !booking.is_party(caller) {
            return Err(CoreError::Forbidden("not a party to this booking".to_string()));
        }
        self.modifications
            .list_for_booking(booking_id)
            .await
            .map_err(CoreError::internal)
    }

    /// Close the booking's open modifications. Returns how many were closed.
    async fn close_open(&self, booking_id: Uuid) -> CoreResult<usize> {
        let all = self
            .modifications
            .list_for_booking(booking_id)
            .await
            .map_err(CoreError::internal)?;

        let mut closed = 0;
        for open in all.iter().filter(|m| !m.status.is_terminal()) {
            let result = self
                .transition(open.id, |m, now| {
                    m.close("system", ActorType::System, "Booking cancelled".to_string(), now)
                })
                .await;
            match result {
                Ok(modification) => {
                    closed += 1;
                    self.notify(&modification).await;
                }
                Err(CoreError::InvalidStateTransition { .. }) => {}
                Err(e) => tracing::warn!("Could not close modification {}: {}", open.id, e),
            }
        }
        if closed > 0 {
            tracing::info!("Closed {} open modifications of cancelled booking {}", closed, booking_id);
        }
        Ok(closed)
    }

    async fn expire_one(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<Option<BookingModification>> {
        match self
            .transition(id, |m, _| {
                if m.expire(now) {
                    Ok(())
                } else {
                    Err(CoreError::invalid_transition(m.status, "expire"))
                }
            })
            .await
        {
            Ok(modification) => Ok(Some(modification)),
            Err(CoreError::InvalidStateTransition { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn load(&self, id: Uuid) -> CoreResult<BookingModification> {
        self.modifications
            .get(id)
            .await
            .map_err(CoreError::internal)?
            .ok_or_else(|| CoreError::NotFound(format!("Modification {} not found", id)))
    }

    async fn load_with_booking(&self, id: Uuid) -> CoreResult<(BookingModification, Booking)> {
        let modification = self.load(id).await?;
        let booking = self.coordinator.find_booking(modification.booking_id).await?;
        Ok((modification, booking))
    }

    /// Reload, apply one state change and write it back if nobody else wrote
    /// first. Retries re-run `apply` against the fresh record.
    async fn transition<F>(&self, id: Uuid, mut apply: F) -> CoreResult<BookingModification>
    where
        F: FnMut(&mut BookingModification, DateTime<Utc>) -> CoreResult<()> + Send,
    {
        for attempt in 1..=self.settings.max_retries.max(1) {
            let mut modification = self.load(id).await?;
            let expected = modification.version;
            apply(&mut modification, Utc::now())?;
            modification.version += 1;

            match self
                .modifications
                .update(&modification, expected)
                .await
                .map_err(CoreError::internal)?
            {
                WriteOutcome::Written => return Ok(modification),
                WriteOutcome::VersionConflict => {
                    tracing::debug!("Version conflict on modification {} (attempt {})", id, attempt);
                }
            }
        }
        Err(CoreError::conflict(format!(
            "Modification {} was updated concurrently, retry later",
            id
        )))
    }

    async fn notify(&self, modification: &BookingModification) {
        let Some(entry) = modification.timeline.last() else {
            return;
        };
        dispatch_best_effort(
            self.dispatcher.as_ref(),
            DomainEvent::ModificationUpdated(ModificationEvent {
                modification_id: modification.id,
                booking_id: modification.booking_id,
                status: entry.status.to_string(),
                actor: entry.actor.clone(),
                actor_type: entry.actor_type.as_str().to_string(),
                notes: entry.notes.clone().map(Masked),
                timestamp: entry.timestamp.timestamp(),
            }),
        )
        .await;
    }
}

fn require_admin(caller: &Caller) -> CoreResult<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(CoreError::Forbidden("admin role required".to_string()))
    }
}
