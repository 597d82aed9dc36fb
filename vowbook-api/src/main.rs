use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vowbook_api::{app, worker, AppState, AuthConfig, Backends};
use vowbook_core::{LogDispatcher, NotificationDispatcher};
use vowbook_store::app_config::Config;
use vowbook_store::{DbClient, RedisClient, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vowbook_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Vowbook API on port {}", config.server.port);

    let dispatcher = dispatcher(&config)?;
    let mut rules = config.business_rules.clone();

    let backends = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Backends::in_memory(dispatcher)
        }
        StorageBackend::Postgres => {
            let db_config = config
                .database
                .as_ref()
                .context("database.url is required for the postgres backend")?;
            let db = DbClient::new(&db_config.url, db_config.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            rules = db
                .fetch_business_rules(rules)
                .await
                .context("Failed to load business rules")?;
            Backends::postgres(db.pool.clone(), dispatcher)
        }
    };

    let redis = match &config.redis {
        Some(redis_config) => match RedisClient::new(&redis_config.url).await {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!("Redis unavailable, rate limiting disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let sweep_every = std::time::Duration::from_secs(rules.expiry_sweep_seconds.max(1));
    let state = AppState::new(
        backends,
        rules,
        AuthConfig { secret: config.auth.jwt_secret.clone() },
        redis,
    );
    tokio::spawn(worker::start_expiry_worker(state.workflow.clone(), sweep_every));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(feature = "kafka")]
fn dispatcher(config: &Config) -> anyhow::Result<Arc<dyn NotificationDispatcher>> {
    match &config.kafka {
        Some(kafka) => {
            let producer = vowbook_store::EventProducer::new(&kafka.brokers)
                .context("Failed to create Kafka producer")?;
            Ok(Arc::new(producer))
        }
        None => Ok(Arc::new(LogDispatcher)),
    }
}

#[cfg(not(feature = "kafka"))]
fn dispatcher(config: &Config) -> anyhow::Result<Arc<dyn NotificationDispatcher>> {
    if config.kafka.is_some() {
        tracing::warn!("kafka configured but the binary was built without the `kafka` feature");
    }
    Ok(Arc::new(LogDispatcher))
}
