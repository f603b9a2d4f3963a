//! Caller-facing verbs over the selector, ledger and download pipeline.
//!
//! Nothing here schedules work. The front-end calls [`Orchestrator::poll_tick`]
//! on its own cadence for each job returned by
//! [`Orchestrator::recover_on_start`] or [`Orchestrator::submit_job`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::credentials::{CredentialService, TokenSelector};
use crate::database::models::{IncompleteTask, PROGRESS_COMPLETE};
use crate::downloader::{DownloadPipeline, PublishOutcome, RedownloadOutcome, WatermarkSettings};
use crate::error::Failure;
use crate::ledger::{JobLedger, JobSummary, RecoveryScanner};
use crate::remote::{CreateVideoRequest, PendingStatus, RemoteApi};
use crate::{Error, Result};

/// Offset used for the drafts listing; the newest page is enough.
const DRAFTS_OFFSET: u32 = 0;

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedJob {
    pub task_id: String,
    pub credential_id: i64,
}

/// What one poll observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollOutcome {
    InProgress { progress: f64 },
    /// The job finished; `downloaded` is 0 when no matching draft was listed yet.
    Completed { downloaded: usize },
}

impl PollOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

pub struct Orchestrator {
    selector: Arc<TokenSelector>,
    credentials: Arc<CredentialService>,
    ledger: Arc<JobLedger>,
    recovery: Arc<RecoveryScanner>,
    pipeline: Arc<DownloadPipeline>,
    remote: Arc<dyn RemoteApi>,
    watermark: WatermarkSettings,
    drafts_page_size: u32,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        selector: Arc<TokenSelector>,
        credentials: Arc<CredentialService>,
        ledger: Arc<JobLedger>,
        recovery: Arc<RecoveryScanner>,
        pipeline: Arc<DownloadPipeline>,
        remote: Arc<dyn RemoteApi>,
        watermark: WatermarkSettings,
        drafts_page_size: u32,
    ) -> Self {
        Self {
            selector,
            credentials,
            ledger,
            recovery,
            pipeline,
            remote,
            watermark,
            drafts_page_size,
        }
    }

    pub fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    pub fn pipeline(&self) -> &DownloadPipeline {
        &self.pipeline
    }

    /// Select a credential, create the remote job and record it.
    #[instrument(skip(self, request), fields(orientation = %request.orientation))]
    pub async fn submit_job(
        &self,
        require_pro: bool,
        request: &CreateVideoRequest,
    ) -> Result<SubmittedJob> {
        if request.prompt.trim().is_empty() {
            return Err(Error::EmptyIdentifier("prompt"));
        }

        let selected = self.selector.select(require_pro).await?;
        let raw = self.remote.create_video(&selected.bearer, request).await?;
        let task_id = self
            .ledger
            .upsert_result(selected.credential_id, &raw, &request.prompt)
            .await?;

        info!(task_id = %task_id, credential_id = selected.credential_id, "Job submitted");
        Ok(SubmittedJob {
            task_id,
            credential_id: selected.credential_id,
        })
    }

    /// Check a job once. On completion, progress is pinned at 100 and the
    /// job's own draft is downloaded.
    #[instrument(skip(self))]
    pub async fn poll_tick(&self, task_id: &str) -> Result<PollOutcome> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(Error::EmptyIdentifier("task_id"));
        }

        let credential_id = self.ledger.lookup_credential(task_id).await?;
        let bearer = self.selector.bearer_for(credential_id).await?;

        let pending = self.remote.pending(&bearer).await?;
        let status = PendingStatus::from_response(&pending)?;

        if let PendingStatus::InProgress(progress) = status
            && !status.is_done()
        {
            self.ledger.update_progress(task_id, progress).await?;
            return Ok(PollOutcome::InProgress { progress });
        }

        self.ledger.update_progress(task_id, PROGRESS_COMPLETE).await?;
        let drafts = self
            .remote
            .drafts(&bearer, self.drafts_page_size, DRAFTS_OFFSET)
            .await?;
        let downloaded = self
            .pipeline
            .selective_download(&drafts.items, task_id)
            .await?;

        info!(downloaded, "Job completed");
        Ok(PollOutcome::Completed { downloaded })
    }

    /// Jobs the caller should resume polling, oldest first.
    pub async fn recover_on_start(&self) -> Vec<IncompleteTask> {
        self.recovery.list_incomplete().await
    }

    /// Remove a job and its download records, optionally unlinking files.
    #[instrument(skip(self))]
    pub async fn purge_job(&self, task_id: &str, delete_files: bool) -> Result<()> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(Error::EmptyIdentifier("task_id"));
        }

        let records = self.pipeline.purge_task(task_id, delete_files).await?;
        let jobs = self.ledger.delete(task_id).await?;
        if jobs == 0 && records == 0 {
            warn!("Nothing stored for job");
        } else {
            info!(records, "Job purged");
        }
        Ok(())
    }

    pub async fn redownload(&self, task_id: &str) -> Result<RedownloadOutcome> {
        self.pipeline.redownload(task_id).await
    }

    /// Run the publish chain. Blank overrides fall back to the configured
    /// endpoint and token. Failures come back as a displayable reason.
    pub async fn publish_and_fetch_unwatermarked(
        &self,
        task_id: &str,
        endpoint: Option<&str>,
        token: Option<&str>,
    ) -> std::result::Result<PublishOutcome, Failure> {
        let settings = self.watermark_settings(endpoint, token);
        self.pipeline
            .publish_and_fetch_unwatermarked(task_id, &settings)
            .await
            .map_err(|error| {
                warn!(task_id, error = %error, "Publish chain failed");
                error.failure()
            })
    }

    fn watermark_settings(&self, endpoint: Option<&str>, token: Option<&str>) -> WatermarkSettings {
        let pick = |over: Option<&str>, base: &Option<String>| {
            over.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .or_else(|| base.clone())
        };
        WatermarkSettings {
            endpoint: pick(endpoint, &self.watermark.endpoint),
            token: pick(token, &self.watermark.token),
        }
    }

    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        self.ledger.list_jobs().await
    }

    pub async fn clear_downloads(&self) -> Result<usize> {
        self.pipeline.clear_downloads().await
    }

    pub async fn downloads_map(&self) -> Result<HashMap<String, String>> {
        self.pipeline.downloads_map().await
    }
}
