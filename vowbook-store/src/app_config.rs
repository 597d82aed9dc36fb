use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Tunables that may also be overridden at runtime from the
/// `business_rules` table.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BusinessRules {
    pub tax_rate: f64,
    pub currency: String,
    pub counter_offer_ttl_hours: i64,
    pub max_transition_retries: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub rate_limit_per_minute: i64,
    pub expiry_sweep_seconds: u64,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            tax_rate: 0.15,
            currency: "USD".to_string(),
            counter_offer_ttl_hours: 72,
            max_transition_retries: 5,
            default_page_size: 10,
            max_page_size: 100,
            rate_limit_per_minute: 120,
            expiry_sweep_seconds: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `VOWBOOK__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("VOWBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_memory_and_default_rules() {
        let cfg = parse(
            r#"
            [server]
            port = 8080
            [auth]
            jwt_secret = "secret"
            "#,
        );
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert!(cfg.database.is_none());
        assert_eq!(cfg.business_rules.tax_rate, 0.15);
        assert_eq!(cfg.business_rules.counter_offer_ttl_hours, 72);
        assert_eq!(cfg.business_rules.max_page_size, 100);
    }

    #[test]
    fn test_partial_business_rules_keep_other_defaults() {
        let cfg = parse(
            r#"
            [server]
            port = 8080
            [storage]
            backend = "postgres"
            [database]
            url = "postgres://localhost/vowbook"
            [auth]
            jwt_secret = "secret"
            [business_rules]
            tax_rate = 0.2
            "#,
        );
        assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
        assert_eq!(cfg.database.unwrap().max_connections, 5);
        assert_eq!(cfg.business_rules.tax_rate, 0.2);
        assert_eq!(cfg.business_rules.currency, "USD");
        assert_eq!(cfg.business_rules.max_transition_retries, 5);
    }
}
