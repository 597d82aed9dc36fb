pub mod models;
pub mod modification;
pub mod repository;
pub mod memory;
pub mod coordinator;
pub mod workflow;

pub use models::{Booking, BookingQuery, BookingSnapshot, BookingStatus, CreateBookingRequest};
pub use modification::{
    BookingModification, CounterOfferInput, CustomerDecision, ModificationChange, ModificationStatus,
    VendorDecision,
};
pub use repository::{BookingRepository, ModificationRepository};
pub use memory::{InMemoryBookingRepository, InMemoryModificationRepository};
pub use coordinator::{BookingCoordinator, CoordinatorSettings};
pub use workflow::{ModificationWorkflow, WorkflowSettings};
