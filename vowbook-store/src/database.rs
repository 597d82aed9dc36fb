use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay rows of `business_rules` (`{"value": ...}`) on the file defaults.
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows: Vec<(String, Value)> = sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;
        for (key, value) in rows {
            apply_rule(&mut rules, &key, &value);
        }
        Ok(rules)
    }
}

fn apply_rule(rules: &mut BusinessRules, key: &str, value: &Value) {
    let Some(v) = value.get("value") else {
        return;
    };
    match key {
        "tax_rate" => {
            if let Some(f) = v.as_f64() {
                rules.tax_rate = f;
            }
        }
        "currency" => {
            if let Some(s) = v.as_str() {
                rules.currency = s.to_string();
            }
        }
        "counter_offer_ttl_hours" => {
            if let Some(h) = v.as_i64() {
                rules.counter_offer_ttl_hours = h;
            }
        }
        "max_transition_retries" => {
            if let Some(n) = v.as_u64().and_then(|n| u32::try_from(n).ok()) {
                rules.max_transition_retries = n.max(1);
            }
        }
        "default_page_size" => {
            if let Some(n) = v.as_u64().and_then(|n| u32::try_from(n).ok()) {
                rules.default_page_size = n.max(1);
            }
        }
        "max_page_size" => {
            if let Some(n) = v.as_u64().and_then(|n| u32::try_from(n).ok()) {
                rules.max_page_size = n.max(1);
            }
        }
        "rate_limit_per_minute" => {
            if let Some(n) = v.as_i64() {
                rules.rate_limit_per_minute = n;
            }
        }
        "expiry_sweep_seconds" => {
            if let Some(n) = v.as_u64() {
                rules.expiry_sweep_seconds = n.max(1);
            }
        }
        other => tracing::debug!("Ignoring unknown business rule {}", other),
    }
}
