use async_trait::async_trait;
use vowbook_shared::models::DomainEvent;

/// Delivers booking and modification events to both parties (email, push,
/// message bus). Delivery is best effort: callers log failures and carry on.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        event: &DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Dispatcher that only writes events to the log.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(
        &self,
        event: &DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(topic = event.topic(), key = %event.key(), "Dispatching {:?}", event);
        Ok(())
    }
}

/// Sends an event, logging instead of failing when delivery fails.
pub async fn dispatch_best_effort(dispatcher: &dyn NotificationDispatcher, event: DomainEvent) {
    if let Err(e) = dispatcher.dispatch(&event).await {
        tracing::warn!("Failed to dispatch {}: {}", event.topic(), e);
    }
}
