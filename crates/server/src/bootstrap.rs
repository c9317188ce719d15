use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use orderdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use orderdesk_core::{Catalog, DeterministicPricingEngine};
use orderdesk_db::{connect, migrations, DbPool, SqlOrderRepository, SqlProductRepository};
use thiserror::Error;
use tracing::info;

use crate::api::{self, ApiState, CatalogSource};
use crate::health::{self, HealthState};
use crate::relay::{OrderRelayClient, RelayError, RelaySettings};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api_state: ApiState,
}

impl Application {
    pub fn router(&self) -> Router {
        health::router(HealthState::new(self.db_pool.clone(), self.api_state.relay.is_some()))
            .merge(api::router(self.api_state.clone()))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("failed to read catalog `{path}`: {source}")]
    CatalogRead { path: PathBuf, source: std::io::Error },
    #[error("catalog `{path}` is not a valid product list: {source}")]
    CatalogFormat { path: PathBuf, source: serde_json::Error },
    #[error("order relay setup failed: {0}")]
    Relay(#[from] RelayError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let catalog = load_catalog(&config).await?;
    let relay = match RelaySettings::from_config(&config.relay) {
        Some(settings) => Some(Arc::new(OrderRelayClient::new(settings)?)),
        None => None,
    };
    info!(
        event_name = "system.bootstrap.services_ready",
        correlation_id = "bootstrap",
        catalog_source = if matches!(catalog, CatalogSource::Fixed(_)) { "file" } else { "database" },
        relay_enabled = relay.is_some(),
        "api services initialized"
    );

    let engine = DeterministicPricingEngine::standard()
        .with_minimum_order_amount(config.pricing.minimum_order_amount);
    let api_state = ApiState {
        orders: Arc::new(SqlOrderRepository::new(db_pool.clone())),
        products: Arc::new(SqlProductRepository::new(db_pool.clone())),
        catalog,
        engine: Arc::new(engine),
        relay,
    };

    Ok(Application { config, db_pool, api_state })
}

async fn load_catalog(config: &AppConfig) -> Result<CatalogSource, BootstrapError> {
    let Some(path) = config.catalog.path.clone() else {
        return Ok(CatalogSource::Products);
    };

    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| BootstrapError::CatalogRead { path: path.clone(), source })?;
    let catalog = Catalog::from_json_str(&raw)
        .map_err(|source| BootstrapError::CatalogFormat { path: path.clone(), source })?;
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        path = %path.display(),
        products = catalog.len(),
        "catalog file loaded"
    );

    Ok(CatalogSource::Fixed(Arc::new(catalog)))
}
