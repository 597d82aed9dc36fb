pub mod models;
pub mod pagination;
pub mod pii;

pub use pagination::Page;
pub use pii::Masked;
