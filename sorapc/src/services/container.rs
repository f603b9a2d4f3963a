//! Service container for dependency injection.
//!
//! Builds the repositories, remote clients and components once and hands
//! out shared handles.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::Result;
use crate::config::AppConfig;
use crate::credentials::{CredentialService, TokenSelector};
use crate::database::repositories::{
    CredentialRepository, DownloadRepository, SqlxCredentialRepository, SqlxDownloadRepository,
    SqlxTaskRepository, TaskRepository,
};
use crate::downloader::{DownloadDir, DownloadPipeline, HttpMediaFetcher, MediaFetcher};
use crate::ledger::{JobLedger, RecoveryScanner};
use crate::orchestrator::Orchestrator;
use crate::remote::{HttpRemoteApi, HttpWatermarkResolver, RemoteApi, WatermarkResolver};
use crate::utils::http_client::build_client;

pub struct ServiceContainer {
    pub pool: SqlitePool,
    pub orchestrator: Arc<Orchestrator>,
}

impl ServiceContainer {
    /// Wire the production collaborators against `pool`.
    pub async fn new(pool: SqlitePool, config: &AppConfig) -> Result<Self> {
        info!(api = %config.api_base_url, "Initializing service container");

        let client = build_client()?;
        let remote: Arc<dyn RemoteApi> =
            Arc::new(HttpRemoteApi::new(client.clone(), config.api_base_url.clone()));
        let resolver: Arc<dyn WatermarkResolver> =
            Arc::new(HttpWatermarkResolver::new(client.clone()));
        let fetcher: Arc<dyn MediaFetcher> = Arc::new(HttpMediaFetcher::new(client));

        Self::with_collaborators(pool, config, remote, resolver, fetcher).await
    }

    /// Wire the components around caller-supplied remote collaborators.
    pub async fn with_collaborators(
        pool: SqlitePool,
        config: &AppConfig,
        remote: Arc<dyn RemoteApi>,
        resolver: Arc<dyn WatermarkResolver>,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Result<Self> {
        let credential_repo: Arc<dyn CredentialRepository> =
            Arc::new(SqlxCredentialRepository::new(pool.clone()));
        let task_repo: Arc<dyn TaskRepository> = Arc::new(SqlxTaskRepository::new(pool.clone()));
        let download_repo: Arc<dyn DownloadRepository> =
            Arc::new(SqlxDownloadRepository::new(pool.clone()));

        let dir = DownloadDir::new(config.download_dir.clone());
        dir.ensure().await?;

        let selector = Arc::new(TokenSelector::new(credential_repo.clone()));
        let credentials = Arc::new(CredentialService::new(
            credential_repo.clone(),
            remote.clone(),
        ));
        let ledger = Arc::new(JobLedger::new(task_repo.clone(), credential_repo.clone()));
        let recovery = Arc::new(RecoveryScanner::new(task_repo));
        let pipeline = Arc::new(DownloadPipeline::new(
            download_repo,
            credential_repo,
            ledger.clone(),
            remote.clone(),
            resolver,
            fetcher,
            dir,
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            selector,
            credentials,
            ledger,
            recovery,
            pipeline,
            remote,
            config.watermark_settings(),
            config.drafts_page_size,
        ));

        info!(download_dir = %config.download_dir.display(), "Service container ready");
        Ok(Self { pool, orchestrator })
    }
}
