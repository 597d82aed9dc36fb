use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use vowbook_catalog::{PriceFactor, PriceQuote, ServiceLine, SlotKey, MAX_AMOUNT};
use vowbook_core::{Caller, CoreError, CoreResult};

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recurrence {
    pub frequency: RecurrenceFrequency,
    pub interval: u32,
    pub until: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub date: NaiveDate,
    #[serde(with = "vowbook_catalog::clock")]
    pub start_time: NaiveTime,
    #[serde(with = "vowbook_catalog::clock")]
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
    pub timezone: String,
    pub recurring: Option<Recurrence>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicPricing {
    pub multiplier: f64,
    pub factors: Vec<PriceFactor>,
    pub applied_at: DateTime<Utc>,
}

/// Signed adjustment on top of the taxed price; negative amounts are discounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceAdjustment {
    pub reason: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingPricing {
    pub base_price: i64,
    pub dynamic_pricing: DynamicPricing,
    pub discounts: Vec<PriceAdjustment>,
    pub total_price: i64,
    pub currency: String,
    pub tax_rate: f64,
    pub tax_amount: i64,
    pub final_price: i64,
}

impl BookingPricing {
    /// Fails when the adjusted price would leave the quotable range.
    pub fn adjust(&mut self, reason: impl Into<String>, amount: i64) -> CoreResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let adjusted = self
            .final_price
            .checked_add(amount)
            .filter(|price| price.abs() <= MAX_AMOUNT)
            .ok_or_else(|| CoreError::Validation("price adjustment is out of range".to_string()))?;
        self.discounts.push(PriceAdjustment { reason: reason.into(), amount });
        self.final_price = adjusted;
        Ok(())
    }
}

impl From<PriceQuote> for BookingPricing {
    fn from(quote: PriceQuote) -> Self {
        Self {
            base_price: quote.base_price,
            dynamic_pricing: DynamicPricing {
                multiplier: quote.multiplier,
                factors: quote.factors,
                applied_at: quote.applied_at,
            },
            discounts: Vec::new(),
            total_price: quote.total_price,
            currency: quote.currency,
            tax_rate: quote.tax_rate,
            tax_amount: quote.tax_amount,
            final_price: quote.final_price,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

/// Payment summary. Charging happens in the payment gateway, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentInfo {
    pub status: PaymentStatus,
    pub method: Option<String>,
    pub amount: i64,
}

/// A reserved vendor/venue slot with its computed price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub vendor_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub services: Vec<ServiceLine>,
    pub schedule: Schedule,
    pub guest_count: Option<u32>,
    pub pricing: BookingPricing,
    pub status: BookingStatus,
    pub payment: PaymentInfo,
    pub notes: Option<String>,
    pub is_active: bool,
    /// Set together with cancellation; guards against releasing the slot twice.
    pub slot_released: bool,
    pub applied_modifications: Vec<Uuid>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.vendor_id, self.venue_id, self.schedule.date)
    }

    /// Owner, the booked vendor, or an admin.
    pub fn is_party(&self, caller: &Caller) -> bool {
        caller.is_admin() || self.is_owner(caller) || caller.is_vendor(self.vendor_id)
    }

    pub fn is_owner(&self, caller: &Caller) -> bool {
        caller.role == vowbook_core::Role::Customer && caller.id == self.user_id
    }

    /// Bump the version ahead of a version-checked write.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    pub fn snapshot(&self) -> BookingSnapshot {
        BookingSnapshot {
            venue_id: self.venue_id,
            date: self.schedule.date,
            start_time: self.schedule.start_time,
            end_time: self.schedule.end_time,
            guest_count: self.guest_count,
            services: self.services.clone(),
            final_price: self.pricing.final_price,
        }
    }
}

/// The booking fields a modification can touch. Used both for the immutable
/// pre-change copy and for the implemented result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingSnapshot {
    pub venue_id: Option<Uuid>,
    pub date: NaiveDate,
    #[serde(with = "vowbook_catalog::clock")]
    pub start_time: NaiveTime,
    #[serde(with = "vowbook_catalog::clock")]
    pub end_time: NaiveTime,
    pub guest_count: Option<u32>,
    pub services: Vec<ServiceLine>,
    pub final_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub date: NaiveDate,
    #[serde(with = "vowbook_catalog::clock")]
    pub start_time: NaiveTime,
    #[serde(with = "vowbook_catalog::clock")]
    pub end_time: NaiveTime,
    pub duration: Option<i64>,
    pub timezone: Option<String>,
    pub recurring: Option<Recurrence>,
}

/// Booking creation input. Required fields are optional here so that missing
/// ones surface as validation errors rather than decode failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub vendor: Option<Uuid>,
    pub venue: Option<Uuid>,
    pub services: Option<Vec<ServiceLine>>,
    pub schedule: Option<ScheduleRequest>,
    pub guest_count: Option<u32>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<BookingStatus>,
    pub vendor_id: Option<Uuid>,
    pub venue_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Resolved listing filter handed to repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub user_id: Option<String>,
    pub vendor_id: Option<Uuid>,
    pub venue_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.user_id.as_ref().map_or(true, |u| *u == booking.user_id)
            && self.vendor_id.map_or(true, |v| v == booking.vendor_id)
            && self.venue_id.map_or(true, |v| Some(v) == booking.venue_id)
            && self.status.map_or(true, |s| s == booking.status)
            && self.date_from.map_or(true, |d| booking.schedule.date >= d)
            && self.date_to.map_or(true, |d| booking.schedule.date <= d)
    }
}
