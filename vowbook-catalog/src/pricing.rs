use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use vowbook_core::RepoResult;

use crate::rules::PricingRule;

/// A priced service on a booking. Amounts are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_id: Uuid,
    pub quantity: u32,
    pub price: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    TimeBased,
    Seasonal,
}

/// A multiplier that contributed to a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceFactor {
    pub kind: FactorKind,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub base_price: i64,
    pub multiplier: f64,
    pub factors: Vec<PriceFactor>,
    pub total_price: i64,
    pub tax_rate: f64,
    pub tax_amount: i64,
    pub final_price: i64,
    pub currency: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub tax_rate: f64,
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.15,
            currency: "USD".to_string(),
        }
    }
}

/// Where vendor pricing rules come from.
#[async_trait]
pub trait PricingRuleSource: Send + Sync {
    async fn rules_for_vendor(&self, vendor_id: Uuid) -> RepoResult<Vec<PricingRule>>;
}

/// Stateless price calculator.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Pure price computation. The first matching time-based rule and the
    /// first matching seasonal rule each multiply in; nothing else applies.
    pub fn compute_price(
        &self,
        services: &[ServiceLine],
        date: NaiveDate,
        start_time: NaiveTime,
        rules: &[PricingRule],
    ) -> Result<PriceQuote, PricingError> {
        let base_price = services.iter().try_fold(0i64, |sum, s| {
            s.price
                .checked_mul(s.quantity as i64)
                .and_then(|line| sum.checked_add(line))
                .filter(|total| *total <= MAX_AMOUNT)
                .ok_or(PricingError::OutOfRange)
        })?;

        let mut multiplier = 1.0;
        let mut factors = Vec::new();

        if let Some(rule) = rules.iter().find(|r| r.matches_time(date, start_time)) {
            multiplier *= rule.multiplier();
            factors.push(PriceFactor { kind: FactorKind::TimeBased, multiplier: rule.multiplier() });
        }
        if let Some(rule) = rules.iter().find(|r| r.matches_season(date)) {
            multiplier *= rule.multiplier();
            factors.push(PriceFactor { kind: FactorKind::Seasonal, multiplier: rule.multiplier() });
        }

        let total_price = bounded(scale(base_price, multiplier))?;
        let tax_amount = bounded(scale(total_price, self.config.tax_rate))?;
        let final_price = bounded(total_price + tax_amount)?;

        Ok(PriceQuote {
            base_price,
            multiplier,
            factors,
            total_price,
            tax_rate: self.config.tax_rate,
            tax_amount,
            final_price,
            currency: self.config.currency.clone(),
            applied_at: Utc::now(),
        })
    }

    /// Fetch the vendor's rules and price. A failed rule lookup never blocks
    /// a booking: it prices flat (multiplier 1) instead.
    pub async fn quote(
        &self,
        source: &dyn PricingRuleSource,
        vendor_id: Uuid,
        services: &[ServiceLine],
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Result<PriceQuote, PricingError> {
        let rules = match source.rules_for_vendor(vendor_id).await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!("Pricing rule lookup failed for vendor {}, pricing flat: {}", vendor_id, e);
                Vec::new()
            }
        };
        self.compute_price(services, date, start_time, &rules)
    }
}

/// Largest amount, in minor units, a quote may carry. Amounts up to here
/// stay exact through the `f64` multipliers.
pub const MAX_AMOUNT: i64 = 1 << 53;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("price exceeds the supported range")]
    OutOfRange,
}

/// Multiply a minor-unit amount, rounding half away from zero.
pub fn scale(amount: i64, factor: f64) -> i64 {
    (amount as f64 * factor).round() as i64
}

fn bounded(amount: i64) -> Result<i64, PricingError> {
    if (-MAX_AMOUNT..=MAX_AMOUNT).contains(&amount) {
        Ok(amount)
    } else {
        Err(PricingError::OutOfRange)
    }
}

/// Rules held in memory, keyed by vendor.
#[derive(Default)]
pub struct InMemoryPricingRules {
    rules: RwLock<HashMap<Uuid, Vec<PricingRule>>>,
}

impl InMemoryPricingRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_rules(&self, vendor_id: Uuid, rules: Vec<PricingRule>) {
        self.rules.write().await.insert(vendor_id, rules);
    }
}

#[async_trait]
impl PricingRuleSource for InMemoryPricingRules {
    async fn rules_for_vendor(&self, vendor_id: Uuid) -> RepoResult<Vec<PricingRule>> {
        Ok(self.rules.read().await.get(&vendor_id).cloned().unwrap_or_default())
    }
}
