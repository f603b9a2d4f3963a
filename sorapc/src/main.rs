use sorapc::config::AppConfig;
use sorapc::database;
use sorapc::logging::{self, LOG_RETENTION_DAYS};
use sorapc::services::ServiceContainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();
    let (_logging, _guard) = logging::init_logging(&config.log_dir)?;

    if let Err(e) = logging::cleanup_old_logs(&config.log_dir, LOG_RETENTION_DAYS).await {
        tracing::warn!(error = %e, "Failed to cleanup old logs");
    }

    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let container = ServiceContainer::new(pool, &config).await?;

    let incomplete = container.orchestrator.recover_on_start().await;
    for task in &incomplete {
        tracing::info!(task_id = %task.task_id, token_id = task.token_id, "Job awaiting poll");
    }

    tracing::info!(pending = incomplete.len(), "sorapc initialized successfully");

    Ok(())
}
