use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vowbook_catalog::ServiceLine;
use vowbook_core::{Caller, CoreError, CoreResult};

use crate::models::{Booking, BookingSnapshot};

/// Requested change, tagged by `modification_type`. Each kind carries only
/// the fields it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "modification_type", rename_all = "snake_case")]
pub enum ModificationChange {
    DateChange {
        date: NaiveDate,
        #[serde(with = "vowbook_catalog::clock")]
        start_time: NaiveTime,
        #[serde(with = "vowbook_catalog::clock")]
        end_time: NaiveTime,
    },
    GuestCountChange {
        guest_count: u32,
    },
    ServiceChange {
        services: Vec<ServiceLine>,
    },
    LocationChange {
        venue_id: Option<Uuid>,
    },
    Cancellation,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModificationType {
    DateChange,
    GuestCountChange,
    ServiceChange,
    LocationChange,
    Cancellation,
}

impl ModificationChange {
    pub fn modification_type(&self) -> ModificationType {
        match self {
            ModificationChange::DateChange { .. } => ModificationType::DateChange,
            ModificationChange::GuestCountChange { .. } => ModificationType::GuestCountChange,
            ModificationChange::ServiceChange { .. } => ModificationType::ServiceChange,
            ModificationChange::LocationChange { .. } => ModificationType::LocationChange,
            ModificationChange::Cancellation => ModificationType::Cancellation,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        match self {
            ModificationChange::DateChange { start_time, end_time, .. } if start_time >= end_time => Err(
                CoreError::Validation("start_time must be before end_time".to_string()),
            ),
            ModificationChange::GuestCountChange { guest_count: 0 } => {
                Err(CoreError::Validation("guest_count must be positive".to_string()))
            }
            ModificationChange::ServiceChange { services } if services.is_empty() => Err(
                CoreError::Validation("at least one service is required".to_string()),
            ),
            ModificationChange::ServiceChange { services }
                if services.iter().any(|s| s.quantity == 0 || s.price < 0) =>
            {
                Err(CoreError::Validation(
                    "service quantity must be positive and price non-negative".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// The booking fields after this change. `final_price` is left for the
    /// caller to fill in after repricing.
    pub fn apply_to(&self, current: &BookingSnapshot) -> BookingSnapshot {
        let mut next = current.clone();
        match self {
            ModificationChange::DateChange { date, start_time, end_time } => {
                next.date = *date;
                next.start_time = *start_time;
                next.end_time = *end_time;
            }
            ModificationChange::GuestCountChange { guest_count } => next.guest_count = Some(*guest_count),
            ModificationChange::ServiceChange { services } => next.services = services.clone(),
            ModificationChange::LocationChange { venue_id } => next.venue_id = *venue_id,
            ModificationChange::Cancellation => {}
        }
        next
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModificationStatus {
    Pending,
    Approved,
    Rejected,
    CounterOffer,
    CustomerResponsePending,
    /// Customer accepted the vendor's counter-offer; ready to implement.
    Accepted,
    Completed,
    Cancelled,
}

impl ModificationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ModificationStatus::Completed | ModificationStatus::Rejected | ModificationStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModificationStatus::Pending => "pending",
            ModificationStatus::Approved => "approved",
            ModificationStatus::Rejected => "rejected",
            ModificationStatus::CounterOffer => "counter_offer",
            ModificationStatus::CustomerResponsePending => "customer_response_pending",
            ModificationStatus::Accepted => "accepted",
            ModificationStatus::Completed => "completed",
            ModificationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ModificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Customer,
    Vendor,
    Admin,
    System,
}

impl ActorType {
    pub fn of(caller: &Caller) -> Self {
        match caller.role {
            vowbook_core::Role::Customer => ActorType::Customer,
            vowbook_core::Role::Vendor => ActorType::Vendor,
            vowbook_core::Role::Admin => ActorType::Admin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActorType::Customer => "customer",
            ActorType::Vendor => "vendor",
            ActorType::Admin => "admin",
            ActorType::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEvent {
    pub status: ModificationStatus,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub actor_type: ActorType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub sender_type: ActorType,
    pub message: String,
    pub attachments: Vec<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Communication {
    pub messages: Vec<Message>,
    pub last_message_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VendorDecision {
    Approved,
    Rejected,
    CounterOffer,
}

/// Vendor's alternative proposal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterOffer {
    pub changes: ModificationChange,
    pub price_adjustment: i64,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterOfferInput {
    pub changes: ModificationChange,
    #[serde(default)]
    pub price_adjustment: i64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VendorResponse {
    pub status: VendorDecision,
    pub message: String,
    pub responded_by: String,
    pub responded_at: DateTime<Utc>,
    pub counter_offer: Option<CounterOffer>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomerDecision {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerResponse {
    pub status: CustomerDecision,
    pub message: String,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Charge {
    pub description: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceImpact {
    pub original_price: i64,
    pub new_price: Option<i64>,
    pub price_difference: i64,
    pub additional_charges: Vec<Charge>,
    pub refund_amount: Option<i64>,
}

impl PriceImpact {
    fn new(original_price: i64) -> Self {
        Self {
            original_price,
            new_price: None,
            price_difference: 0,
            additional_charges: Vec::new(),
            refund_amount: None,
        }
    }

    /// A positive difference becomes a single surcharge line, a negative one
    /// a refund of its magnitude; zero yields neither.
    pub fn settle(&mut self, new_price: i64) {
        let difference = new_price - self.original_price;
        self.new_price = Some(new_price);
        self.price_difference = difference;
        self.additional_charges.clear();
        self.refund_amount = None;
        if difference > 0 {
            self.additional_charges.push(Charge {
                description: "Modification surcharge".to_string(),
                amount: difference,
            });
        } else if difference < 0 {
            self.refund_amount = Some(-difference);
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// Administrative decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Approval {
    pub decision: ApprovalDecision,
    pub decided_by: String,
    pub notes: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Implementation {
    pub implemented_at: DateTime<Utc>,
    pub implemented_by: String,
    pub final_data: BookingSnapshot,
}

/// A post-booking change request and its negotiation history.
///
/// Every mutator checks the current status first and fails with
/// `InvalidStateTransition` instead of coercing. The timeline only grows and
/// its timestamps never go backwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingModification {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub requested_by: String,
    pub requester_type: ActorType,
    pub change: ModificationChange,
    pub reason: String,
    pub original_data: BookingSnapshot,
    pub vendor_response: Option<VendorResponse>,
    pub customer_response: Option<CustomerResponse>,
    pub price_impact: PriceImpact,
    pub status: ModificationStatus,
    pub timeline: Vec<TimelineEvent>,
    pub communication: Communication,
    pub approval: Option<Approval>,
    pub implementation: Option<Implementation>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingModification {
    pub fn new(
        booking: &Booking,
        requester: &Caller,
        change: ModificationChange,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        change.validate()?;
        let original_data = booking.snapshot();
        let mut modification = Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            requested_by: requester.id.clone(),
            requester_type: ActorType::of(requester),
            change,
            reason: reason.into(),
            price_impact: PriceImpact::new(original_data.final_price),
            original_data,
            vendor_response: None,
            customer_response: None,
            status: ModificationStatus::Pending,
            timeline: Vec::new(),
            communication: Communication::default(),
            approval: None,
            implementation: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let notes = Some(modification.reason.clone());
        modification.record(ModificationStatus::Pending, &requester.id, ActorType::of(requester), notes, now);
        Ok(modification)
    }

    pub fn modification_type(&self) -> ModificationType {
        self.change.modification_type()
    }

    /// Set the status and append the matching timeline entry.
    fn record(
        &mut self,
        status: ModificationStatus,
        actor: &str,
        actor_type: ActorType,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) {
        let timestamp = self.timeline.last().map_or(now, |last| last.timestamp.max(now));
        self.status = status;
        self.updated_at = timestamp;
        self.timeline.push(TimelineEvent {
            status,
            timestamp,
            actor: actor.to_string(),
            actor_type,
            notes,
        });
    }

    fn expect_status(&self, allowed: &[ModificationStatus], action: &str) -> CoreResult<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(CoreError::invalid_transition(self.status, action))
        }
    }

    pub fn vendor_respond(
        &mut self,
        responder: &Caller,
        decision: VendorDecision,
        message: String,
        counter_offer: Option<CounterOfferInput>,
        counter_offer_ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.expect_status(&[ModificationStatus::Pending], "respond as vendor")?;
        if self.requester_type == ActorType::Vendor {
            return Err(CoreError::invalid_transition(
                "awaiting the customer",
                "respond as vendor to a vendor-requested change",
            ));
        }

        let counter_offer = match (decision, counter_offer) {
            (VendorDecision::CounterOffer, Some(input)) => {
                input.changes.validate()?;
                Some(CounterOffer {
                    changes: input.changes,
                    price_adjustment: input.price_adjustment,
                    message: input.message,
                    expires_at: now + counter_offer_ttl,
                })
            }
            (VendorDecision::CounterOffer, None) => {
                return Err(CoreError::Validation(
                    "counter_offer is required when responding with a counter-offer".to_string(),
                ));
            }
            (_, Some(_)) => {
                return Err(CoreError::Validation(
                    "counter_offer is only allowed with a counter-offer response".to_string(),
                ));
            }
            (_, None) => None,
        };

        self.vendor_response = Some(VendorResponse {
            status: decision,
            message: message.clone(),
            responded_by: responder.id.clone(),
            responded_at: now,
            counter_offer,
        });

        let actor_type = ActorType::of(responder);
        match decision {
            VendorDecision::Approved => {
                self.record(ModificationStatus::Approved, &responder.id, actor_type, Some(message), now)
            }
            VendorDecision::Rejected => {
                self.record(ModificationStatus::Rejected, &responder.id, actor_type, Some(message), now)
            }
            VendorDecision::CounterOffer => {
                self.record(ModificationStatus::CounterOffer, &responder.id, actor_type, Some(message), now);
                self.record(
                    ModificationStatus::CustomerResponsePending,
                    &responder.id,
                    actor_type,
                    Some("Awaiting customer response".to_string()),
                    now,
                );
            }
        }
        Ok(())
    }

    pub fn counter_offer(&self) -> Option<&CounterOffer> {
        self.vendor_response.as_ref().and_then(|r| r.counter_offer.as_ref())
    }

    pub fn counter_offer_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ModificationStatus::CustomerResponsePending
            && self.counter_offer().is_some_and(|c| c.expires_at <= now)
    }

    /// The customer answers counter-offers and any change the vendor asked for.
    pub fn awaiting_customer(&self) -> bool {
        match self.status {
            ModificationStatus::CustomerResponsePending => true,
            ModificationStatus::Pending => self.requester_type == ActorType::Vendor,
            _ => false,
        }
    }

    pub fn customer_respond(
        &mut self,
        customer: &Caller,
        decision: CustomerDecision,
        message: String,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if !self.awaiting_customer() {
            return Err(CoreError::invalid_transition(self.status, "respond as customer"));
        }
        if self.counter_offer_expired(now) {
            return Err(CoreError::invalid_transition("counter_offer expired", "respond as customer"));
        }

        self.customer_response = Some(CustomerResponse {
            status: decision,
            message: message.clone(),
            responded_at: now,
        });
        let next = match decision {
            CustomerDecision::Accepted => ModificationStatus::Accepted,
            CustomerDecision::Rejected => ModificationStatus::Rejected,
        };
        self.record(next, &customer.id, ActorType::of(customer), Some(message), now);
        Ok(())
    }

    pub fn approve(&mut self, admin: &Caller, notes: Option<String>, now: DateTime<Utc>) -> CoreResult<()> {
        self.expect_status(&[ModificationStatus::Pending], "approve")?;
        self.approval = Some(Approval {
            decision: ApprovalDecision::Approved,
            decided_by: admin.id.clone(),
            notes: notes.clone(),
            decided_at: now,
        });
        self.record(ModificationStatus::Approved, &admin.id, ActorType::Admin, notes, now);
        Ok(())
    }

    pub fn reject(&mut self, admin: &Caller, reason: String, now: DateTime<Utc>) -> CoreResult<()> {
        self.expect_status(&[ModificationStatus::Pending], "reject")?;
        self.approval = Some(Approval {
            decision: ApprovalDecision::Rejected,
            decided_by: admin.id.clone(),
            notes: Some(reason.clone()),
            decided_at: now,
        });
        self.record(ModificationStatus::Rejected, &admin.id, ActorType::Admin, Some(reason), now);
        Ok(())
    }

    /// Withdraw the request before anyone has committed to it.
    pub fn cancel(&mut self, caller: &Caller, reason: Option<String>, now: DateTime<Utc>) -> CoreResult<()> {
        self.expect_status(
            &[
                ModificationStatus::Pending,
                ModificationStatus::CounterOffer,
                ModificationStatus::CustomerResponsePending,
            ],
            "cancel",
        )?;
        self.record(ModificationStatus::Cancelled, &caller.id, ActorType::of(caller), reason, now);
        Ok(())
    }

    /// Close a modification that can no longer be implemented because its
    /// booking is gone. Valid from any open status.
    pub fn close(&mut self, actor: &str, actor_type: ActorType, notes: String, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::invalid_transition(self.status, "close"));
        }
        self.record(ModificationStatus::Cancelled, actor, actor_type, Some(notes), now);
        Ok(())
    }

    /// Cancel an unanswered counter-offer past its expiry. Returns whether
    /// anything changed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.counter_offer_expired(now) {
            return false;
        }
        self.record(
            ModificationStatus::Cancelled,
            "system",
            ActorType::System,
            Some("Counter-offer expired without a customer response".to_string()),
            now,
        );
        true
    }

    pub fn add_message(
        &mut self,
        sender: &Caller,
        message: String,
        attachments: Vec<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::invalid_transition(self.status, "add a message"));
        }
        if message.trim().is_empty() {
            return Err(CoreError::Validation("message must not be empty".to_string()));
        }
        let sent_at = self.communication.last_message_at.map_or(now, |last| last.max(now));
        self.communication.messages.push(Message {
            sender: sender.id.clone(),
            sender_type: ActorType::of(sender),
            message,
            attachments,
            sent_at,
        });
        self.communication.last_message_at = Some(sent_at);
        self.updated_at = self.updated_at.max(sent_at);
        Ok(())
    }

    /// The change set that was agreed on, with the vendor's price adjustment:
    /// the original request once approved, the counter-offer once accepted.
    pub fn agreed_change(&self) -> CoreResult<(&ModificationChange, i64)> {
        match self.status {
            ModificationStatus::Approved => Ok((&self.change, 0)),
            ModificationStatus::Accepted => {
                let accepted = self
                    .customer_response
                    .as_ref()
                    .is_some_and(|r| r.status == CustomerDecision::Accepted);
                match (accepted, self.counter_offer()) {
                    (true, Some(offer)) => Ok((&offer.changes, offer.price_adjustment)),
                    (true, None) if self.requester_type == ActorType::Vendor => Ok((&self.change, 0)),
                    _ => Err(CoreError::invalid_transition(self.status, "implement without an accepted counter-offer")),
                }
            }
            _ => Err(CoreError::invalid_transition(self.status, "implement")),
        }
    }

    pub fn complete(
        &mut self,
        implementer: &Caller,
        final_data: BookingSnapshot,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.agreed_change()?;
        self.price_impact.settle(final_data.final_price);
        self.implementation = Some(Implementation {
            implemented_at: now,
            implemented_by: implementer.id.clone(),
            final_data,
        });
        self.record(
            ModificationStatus::Completed,
            &implementer.id,
            ActorType::of(implementer),
            Some("Modification implemented".to_string()),
            now,
        );
        Ok(())
    }
}
