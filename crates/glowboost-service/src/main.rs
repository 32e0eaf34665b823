//! # GlowBoost Service
//!
//! Binary entry point for the GlowBoost booking webhook service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes structured logging
//! - Builds the booking store selected by configuration
//! - Starts the HTTP server from glowboost-api

use anyhow::Context;
use glowboost_api::{
    config::{CONFIG_FILE_ENV, DATABASE_URL_ENV, WEBHOOK_SECRET_ENV},
    start_server, LoggingConfig, ServiceConfig, StoreBackend,
};
use glowboost_core::{BookingStore, InMemoryBookingStore};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code when the store cannot be initialized
const EXIT_STORE_UNAVAILABLE: i32 = 4;

/// Exit code for invalid configuration
const EXIT_CONFIG: i32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration is loaded before logging so the logging section applies;
    // a load failure is reported once logging is up with defaults.
    let loaded = load_config();

    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_logging(&logging);

    info!("Starting GlowBoost Service");

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Service configuration is invalid; aborting");
            std::process::exit(EXIT_CONFIG);
        }
    };

    info!(
        environment = %service_config.environment,
        endpoint = %service_config.webhook.endpoint_path,
        signature_enforced = service_config.webhook.secret.is_some(),
        store = ?service_config.store.backend,
        "Configuration loaded"
    );

    let store = match build_store(&service_config).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to initialize booking store; aborting");
            std::process::exit(EXIT_STORE_UNAVAILABLE);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(service_config, store).await {
        error!("Failed to start server: {}", e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// Load, complete and validate the service configuration
fn load_config() -> anyhow::Result<ServiceConfig> {
    let explicit_path = std::env::var(CONFIG_FILE_ENV).ok();

    let mut config = ServiceConfig::load(explicit_path.as_deref())
        .context("could not load service configuration")?;

    config.apply_env_fallbacks(
        std::env::var(WEBHOOK_SECRET_ENV).ok(),
        std::env::var(DATABASE_URL_ENV).ok(),
    )?;

    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` wins over the configured filter
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new(LoggingConfig::default().level))
}

fn init_logging(logging: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(env_filter(logging));

    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the store selected by `store.backend`
async fn build_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn BookingStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let salons = config.seed_salons()?;
            let count = salons.len();
            let store = InMemoryBookingStore::with_salons(salons)
                .context("could not provision configured salons")?;

            if count == 0 {
                warn!("In-memory store has no salons; every booking will be rejected");
            }
            info!(salons = count, "Using in-memory booking store");
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres => build_postgres_store(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn build_postgres_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn BookingStore>> {
    use glowboost_core::store::PostgresBookingStore;

    let url = config
        .store
        .database_url
        .as_deref()
        .context("store.database_url is not set")?;

    let store = PostgresBookingStore::connect(
        url,
        config.store.max_connections,
        std::time::Duration::from_secs(config.store.acquire_timeout_seconds),
    )
    .await
    .context("could not connect to PostgreSQL")?;

    if config.store.run_migrations {
        store
            .run_migrations()
            .await
            .context("could not apply database schema")?;
    }

    for salon in config.seed_salons()? {
        match store.find_salon_by_organizer_email(&salon.organizer_email).await? {
            Some(_) => {}
            None => store.add_salon(&salon).await?,
        }
    }

    info!("Using PostgreSQL booking store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn build_postgres_store(_config: &ServiceConfig) -> anyhow::Result<Arc<dyn BookingStore>> {
    anyhow::bail!("store.backend is 'postgres' but this binary was built without the 'postgres' feature")
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
