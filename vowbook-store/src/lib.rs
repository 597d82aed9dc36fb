pub mod app_config;
pub mod database;
pub mod availability_repo;
pub mod booking_repo;
pub mod modification_repo;
pub mod pricing_repo;
pub mod redis_repo;
#[cfg(feature = "kafka")]
pub mod events;

pub use app_config::{Config, StorageBackend};
pub use database::DbClient;
pub use availability_repo::PgAvailabilityStore;
pub use booking_repo::PgBookingRepository;
pub use modification_repo::PgModificationRepository;
pub use pricing_repo::PgPricingRules;
pub use redis_repo::RedisClient;
#[cfg(feature = "kafka")]
pub use events::EventProducer;
