//! Job record database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Progress value at which a job counts as complete.
pub const PROGRESS_COMPLETE: f64 = 100.0;

/// A remote video-generation job tracked by the ledger.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskResultDbModel {
    pub id: i64,
    /// Remote job id assigned by the service.
    pub task_id: String,
    /// Credential that created the job.
    pub token_id: i64,
    /// Raw last-seen result payload.
    pub result_json: Option<String>,
    pub progress_pct: Option<f64>,
    pub prompt: String,
    pub created_at: i64,
}

/// Projection used by the recovery scan.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct IncompleteTask {
    pub task_id: String,
    pub token_id: i64,
}

/// Job record joined with its most recent download, newest first.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskListRow {
    pub task_id: String,
    pub token_id: i64,
    pub prompt: String,
    pub progress_pct: Option<f64>,
    pub created_at: i64,
    pub local_path: Option<String>,
}
