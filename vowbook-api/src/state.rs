use chrono::Duration;
use sqlx::PgPool;
use std::sync::Arc;
use vowbook_catalog::{
    AvailabilityStore, InMemoryAvailabilityStore, InMemoryPricingRules, PricingConfig, PricingEngine,
    PricingRuleSource,
};
use vowbook_core::NotificationDispatcher;
use vowbook_order::{
    BookingCoordinator, BookingRepository, CoordinatorSettings, InMemoryBookingRepository,
    InMemoryModificationRepository, ModificationRepository, ModificationWorkflow, WorkflowSettings,
};
use vowbook_store::app_config::BusinessRules;
use vowbook_store::{PgAvailabilityStore, PgBookingRepository, PgModificationRepository, PgPricingRules, RedisClient};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// The storage and delivery adapters the services run on.
pub struct Backends {
    pub availability: Arc<dyn AvailabilityStore>,
    pub pricing_rules: Arc<dyn PricingRuleSource>,
    pub bookings: Arc<dyn BookingRepository>,
    pub modifications: Arc<dyn ModificationRepository>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
}

impl Backends {
    pub fn in_memory(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            availability: Arc::new(InMemoryAvailabilityStore::new()),
            pricing_rules: Arc::new(InMemoryPricingRules::new()),
            bookings: Arc::new(InMemoryBookingRepository::new()),
            modifications: Arc::new(InMemoryModificationRepository::new()),
            dispatcher,
        }
    }

    pub fn postgres(pool: PgPool, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            availability: Arc::new(PgAvailabilityStore::new(pool.clone())),
            pricing_rules: Arc::new(PgPricingRules::new(pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(pool.clone())),
            modifications: Arc::new(PgModificationRepository::new(pool)),
            dispatcher,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<BookingCoordinator>,
    pub workflow: Arc<ModificationWorkflow>,
    pub availability: Arc<dyn AvailabilityStore>,
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    pub fn new(
        backends: Backends,
        rules: BusinessRules,
        auth: AuthConfig,
        redis: Option<Arc<RedisClient>>,
    ) -> Self {
        let pricing = PricingEngine::new(PricingConfig {
            tax_rate: rules.tax_rate,
            currency: rules.currency.clone(),
        });
        let coordinator = Arc::new(
            BookingCoordinator::new(
                backends.availability.clone(),
                backends.pricing_rules,
                backends.bookings,
                backends.dispatcher.clone(),
            )
            .with_pricing(pricing)
            .with_settings(CoordinatorSettings {
                max_retries: rules.max_transition_retries,
                default_page_size: rules.default_page_size,
                max_page_size: rules.max_page_size,
            }),
        );
        let workflow = Arc::new(
            ModificationWorkflow::new(backends.modifications, coordinator.clone(), backends.dispatcher)
                .with_settings(WorkflowSettings {
                    counter_offer_ttl: Duration::hours(rules.counter_offer_ttl_hours),
                    max_retries: rules.max_transition_retries,
                }),
        );

        Self {
            coordinator,
            workflow,
            availability: backends.availability,
            redis,
            auth,
            business_rules: rules,
        }
    }
}
