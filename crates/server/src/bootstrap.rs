use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use dirtybox_agent::OpenAiChatClient;
use dirtybox_backend::HttpBackendClient;
use dirtybox_core::config::{AppConfig, ConfigError, LoadOptions};
use dirtybox_db::{connect, migrations, DbPool, SqlConversationRepository};
use dirtybox_whatsapp::HttpWhatsAppGateway;

use crate::funnel::FunnelService;

const GATEWAY_TIMEOUT_SECS: u64 = 30;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub funnel: Arc<FunnelService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let whatsapp_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
        .build()
        .map_err(BootstrapError::HttpClient)?;
    let gateway = HttpWhatsAppGateway::new(
        whatsapp_http,
        config.whatsapp.base_url.clone(),
        config.whatsapp.api_token.clone(),
    );

    let llm_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.llm.timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;
    let llm = OpenAiChatClient::new(
        llm_http,
        config.llm.api_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        config.llm.max_retries,
    );

    let backend_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.backend.timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;
    let backend = HttpBackendClient::new(
        backend_http,
        config.backend.base_url.clone(),
        config.backend.api_token.clone(),
    );

    let repository = SqlConversationRepository::new(db_pool.clone());

    let funnel = Arc::new(FunnelService::new(
        Arc::new(repository),
        Arc::new(gateway),
        Arc::new(llm),
        Arc::new(backend),
        config.funnel.history_window,
        config.whatsapp.agent_sender_id.clone(),
    ));

    Ok(Application { config, db_pool, funnel })
}
