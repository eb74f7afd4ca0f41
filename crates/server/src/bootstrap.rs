use std::sync::Arc;

use magalia_core::config::{AppConfig, ConfigError};
use magalia_db::repositories::RepositoryError;
use magalia_db::{connect_with_settings, migrations, DbPool};
use magalia_export::{ExportError, ExportSettings, HttpImageFetcher};
use thiserror::Error;
use tracing::info;

use crate::services::Repositories;
use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("repository setup failed: {0}")]
    Repository(#[from] RepositoryError),
    #[error("image client setup failed: {0}")]
    ImageClient(#[from] ExportError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    let repositories = Repositories::sql(db_pool.clone()).await?;
    let fetcher = HttpImageFetcher::new(&ExportSettings::from(&config.export))?;
    let state = AppState::new(&repositories, &config, Arc::new(fetcher));
    info!(
        event_name = "system.bootstrap.services_ready",
        correlation_id = "bootstrap",
        template = %config.export.word_template_path.display(),
        throttle_minutes = config.versioning.auto_throttle_minutes,
        "quote services initialized"
    );

    Ok(Application { config, db_pool, state })
}
