use uuid::Uuid;
use crate::pii::Masked;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCreatedEvent {
    pub booking_id: Uuid,
    pub user_id: String,
    pub vendor_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub date: chrono::NaiveDate,
    pub final_price: i64,
    pub currency: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub cancelled_by: String,
    pub reason: Option<Masked<String>>,
    pub timestamp: i64,
}

/// Emitted for every timeline entry or message on a modification so both
/// parties can be notified.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ModificationEvent {
    pub modification_id: Uuid,
    pub booking_id: Uuid,
    pub status: String,
    pub actor: String,
    pub actor_type: String,
    pub notes: Option<Masked<String>>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingCreated(BookingCreatedEvent),
    BookingCancelled(BookingCancelledEvent),
    ModificationUpdated(ModificationEvent),
    ModificationMessage(ModificationEvent),
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated(_) => "booking.created",
            DomainEvent::BookingCancelled(_) => "booking.cancelled",
            DomainEvent::ModificationUpdated(_) => "modification.updated",
            DomainEvent::ModificationMessage(_) => "modification.message",
        }
    }

    /// Partition key: events for one booking stay ordered.
    pub fn key(&self) -> Uuid {
        match self {
            DomainEvent::BookingCreated(e) => e.booking_id,
            DomainEvent::BookingCancelled(e) => e.booking_id,
            DomainEvent::ModificationUpdated(e) | DomainEvent::ModificationMessage(e) => e.booking_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged_and_keyed_by_booking() {
        let booking_id = Uuid::new_v4();
        let event = DomainEvent::ModificationMessage(ModificationEvent {
            modification_id: Uuid::new_v4(),
            booking_id,
            status: "pending".to_string(),
            actor: "user-1".to_string(),
            actor_type: "customer".to_string(),
            notes: Some(Masked("call me".to_string())),
            timestamp: 0,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "modification_message");
        assert_eq!(json["notes"], "call me");
        assert_eq!(event.key(), booking_id);
        assert_eq!(event.topic(), "modification.message");
    }
}
