use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use vowbook_catalog::{PricingRule, PricingRuleSource};
use vowbook_core::RepoResult;

/// Vendor pricing rules, one JSONB rule per row, in priority order.
pub struct PgPricingRules {
    pool: PgPool,
}

impl PgPricingRules {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PricingRuleSource for PgPricingRules {
    async fn rules_for_vendor(&self, vendor_id: Uuid) -> RepoResult<Vec<PricingRule>> {
        let rows: Vec<(Json<PricingRule>,)> = sqlx::query_as(
            "SELECT rule FROM pricing_rules WHERE vendor_id = $1 ORDER BY priority, created_at",
        )
        .bind(vendor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(rule),)| rule).collect())
    }
}
