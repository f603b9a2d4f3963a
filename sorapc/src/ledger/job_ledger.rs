use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::database::models::{PROGRESS_COMPLETE, TaskListRow, TaskResultDbModel};
use crate::database::repositories::{CredentialRepository, TaskRepository};
use crate::database::time::now_ms;
use crate::utils::json::non_blank_str;
use crate::{Error, Result};

/// Key of the rate-limit object inside job and status payloads.
const RATE_LIMIT_KEY: &str = "rate_limit_and_credit_balance";

/// Coarse job state for listings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Done,
}

impl JobStatus {
    pub fn from_progress(progress: Option<f64>) -> Self {
        if progress.is_some_and(|p| p >= PROGRESS_COMPLETE) {
            Self::Done
        } else {
            Self::Running
        }
    }
}

/// A job record with its most recent local file, if any.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub task_id: String,
    pub credential_id: i64,
    pub prompt: String,
    pub progress: f64,
    pub status: JobStatus,
    pub local_path: Option<String>,
    pub created_at: i64,
}

impl From<TaskListRow> for JobSummary {
    fn from(row: TaskListRow) -> Self {
        Self {
            status: JobStatus::from_progress(row.progress_pct),
            progress: row.progress_pct.unwrap_or(0.0),
            task_id: row.task_id,
            credential_id: row.token_id,
            prompt: row.prompt,
            local_path: row.local_path.filter(|p| !p.trim().is_empty()),
            created_at: row.created_at,
        }
    }
}

/// Job records keyed by remote job id.
pub struct JobLedger {
    tasks: Arc<dyn TaskRepository>,
    credentials: Arc<dyn CredentialRepository>,
}

fn require_id<'a>(id: &'a str, what: &'static str) -> Result<&'a str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::EmptyIdentifier(what));
    }
    Ok(id)
}

impl JobLedger {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        credentials: Arc<dyn CredentialRepository>,
    ) -> Self {
        Self { tasks, credentials }
    }

    /// Record a job-creation payload and return its job id.
    ///
    /// Re-recording an existing id overwrites it and resets progress to 0.
    /// A rate-limit object in the payload replaces the credential's cached
    /// one wholesale.
    #[instrument(skip(self, raw_payload, prompt))]
    pub async fn upsert_result(
        &self,
        credential_id: i64,
        raw_payload: &str,
        prompt: &str,
    ) -> Result<String> {
        let payload: Value = serde_json::from_str(raw_payload)
            .map_err(|e| Error::malformed(format!("job payload is not JSON: {e}")))?;
        let task_id = non_blank_str(&payload, "id")
            .ok_or_else(|| Error::malformed("job payload has no id"))?
            .to_string();

        self.tasks
            .upsert_task(&task_id, credential_id, raw_payload, prompt.trim(), now_ms())
            .await?;
        info!(task_id = %task_id, credential_id, "Job recorded");

        if let Some(rate_limit) = payload.get(RATE_LIMIT_KEY).filter(|v| v.is_object()) {
            // The cached snapshot is advisory; a failed refresh does not undo the job record.
            match self
                .credentials
                .replace_rate_limit(credential_id, &rate_limit.to_string())
                .await
            {
                Ok(()) => debug!(
                    credential_id,
                    remaining = ?rate_limit.get("estimated_num_videos_remaining"),
                    "Rate-limit snapshot replaced"
                ),
                Err(error) => warn!(
                    credential_id,
                    error = %error,
                    "Failed to refresh rate-limit snapshot"
                ),
            }
        }

        Ok(task_id)
    }

    /// Store a progress observation. Unknown ids succeed without effect, and
    /// progress never moves backwards.
    pub async fn update_progress(&self, task_id: &str, percent: f64) -> Result<()> {
        let task_id = require_id(task_id, "task_id")?;
        if percent.is_nan() {
            return Err(Error::validation("progress must be a number"));
        }
        let percent = percent.clamp(0.0, PROGRESS_COMPLETE);

        let changed = self.tasks.raise_progress(task_id, percent).await?;
        if changed == 0 {
            debug!(task_id = %task_id, percent, "Progress unchanged (unknown job or lower value)");
        } else {
            debug!(task_id = %task_id, percent, "Progress updated");
        }
        Ok(())
    }

    /// Credential that created the job.
    pub async fn lookup_credential(&self, task_id: &str) -> Result<i64> {
        let task_id = require_id(task_id, "task_id")?;
        Ok(self.tasks.get_task(task_id).await?.token_id)
    }

    pub async fn get(&self, task_id: &str) -> Result<TaskResultDbModel> {
        let task_id = require_id(task_id, "task_id")?;
        self.tasks.get_task(task_id).await
    }

    /// All jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        Ok(self
            .tasks
            .list_tasks()
            .await?
            .into_iter()
            .map(JobSummary::from)
            .collect())
    }

    pub async fn delete(&self, task_id: &str) -> Result<u64> {
        let task_id = require_id(task_id, "task_id")?;
        self.tasks.delete_task(task_id).await
    }
}
