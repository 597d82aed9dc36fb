use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use vowbook_order::ModificationWorkflow;

/// Periodically cancels counter-offers nobody answered in time.
pub async fn start_expiry_worker(workflow: Arc<ModificationWorkflow>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    info!("Counter-offer expiry worker started, sweeping every {:?}", every);

    loop {
        ticker.tick().await;
        match workflow.expire_counter_offers(Utc::now()).await {
            Ok(0) => {}
            Ok(n) => info!("Expired {} counter-offers", n),
            Err(e) => error!("Counter-offer sweep failed: {}", e),
        }
    }
}
