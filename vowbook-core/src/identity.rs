use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CUSTOMER" | "USER" => Ok(Role::Customer),
            "VENDOR" => Ok(Role::Vendor),
            "ADMIN" | "SUPER_ADMIN" => Ok(Role::Admin),
            other => Err(crate::CoreError::Auth(format!("unknown role {}", other))),
        }
    }
}

/// The authenticated principal behind a request, as supplied by the identity
/// provider. Vendors are identified by their vendor id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn customer(id: impl Into<String>) -> Self {
        Self::new(id, Role::Customer)
    }

    pub fn vendor(vendor_id: Uuid) -> Self {
        Self::new(vendor_id.to_string(), Role::Vendor)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True when this caller is the given vendor.
    pub fn is_vendor(&self, vendor_id: Uuid) -> bool {
        self.role == Role::Vendor && self.id == vendor_id.to_string()
    }
}
