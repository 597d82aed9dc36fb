pub mod clock;
pub mod inventory;
pub mod rules;
pub mod pricing;

pub use inventory::{
    AvailabilityCheck, AvailabilityRecord, AvailabilityStore, InMemoryAvailabilityStore,
    SlotKey, SlotUpdate, TimeSlot,
};
pub use rules::{MonthDay, PricingRule};
pub use pricing::{
    InMemoryPricingRules, PriceFactor, PriceQuote, PricingConfig, PricingEngine, PricingError,
    PricingRuleSource, ServiceLine, MAX_AMOUNT,
};
