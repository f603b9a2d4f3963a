//! Download record database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A locally stored artifact, keyed by generation id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DownloadDbModel {
    pub id: i64,
    pub generation_id: String,
    pub task_id: Option<String>,
    /// Identifier of the publish action, or the published URL when none was returned.
    pub post_id: String,
    /// Source URL last used for the transfer.
    pub downloadable_url: Option<String>,
    /// Never empty once the record exists.
    pub local_path: String,
    pub created_at: i64,
}

/// Values written when a transfer completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadUpsert {
    pub generation_id: String,
    pub task_id: String,
    pub post_id: String,
    pub downloadable_url: String,
    pub local_path: String,
}
