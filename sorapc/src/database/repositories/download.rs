//! Download record repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{DownloadDbModel, DownloadUpsert};
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;
use crate::{Error, Result};

/// Download record repository trait.
#[async_trait]
pub trait DownloadRepository: Send + Sync {
    /// Most recent record for a job, newest first.
    async fn latest_for_task(&self, task_id: &str) -> Result<Option<DownloadDbModel>>;
    async fn list_for_task(&self, task_id: &str) -> Result<Vec<DownloadDbModel>>;
    async fn list_downloads(&self) -> Result<Vec<DownloadDbModel>>;
    /// Insert or replace the record keyed by generation id.
    async fn upsert_download(&self, download: &DownloadUpsert) -> Result<()>;
    /// Record a refetch of an existing artifact.
    async fn update_refetched(
        &self,
        id: i64,
        downloadable_url: &str,
        local_path: &str,
        post_id: &str,
    ) -> Result<()>;
    async fn delete_for_task(&self, task_id: &str) -> Result<u64>;
    async fn clear_downloads(&self) -> Result<u64>;
}

/// SQLx implementation of DownloadRepository.
pub struct SqlxDownloadRepository {
    pool: SqlitePool,
}

impl SqlxDownloadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DownloadRepository for SqlxDownloadRepository {
    async fn latest_for_task(&self, task_id: &str) -> Result<Option<DownloadDbModel>> {
        let download = sqlx::query_as::<_, DownloadDbModel>(
            "SELECT * FROM video_downloads WHERE task_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(download)
    }

    async fn list_for_task(&self, task_id: &str) -> Result<Vec<DownloadDbModel>> {
        let downloads = sqlx::query_as::<_, DownloadDbModel>(
            "SELECT * FROM video_downloads WHERE task_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(downloads)
    }

    async fn list_downloads(&self) -> Result<Vec<DownloadDbModel>> {
        let downloads = sqlx::query_as::<_, DownloadDbModel>(
            "SELECT * FROM video_downloads ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(downloads)
    }

    async fn upsert_download(&self, download: &DownloadUpsert) -> Result<()> {
        if download.local_path.is_empty() {
            return Err(Error::validation("download local_path must not be empty"));
        }
        retry_on_sqlite_busy("upsert_download", || async {
            sqlx::query(
                r#"
                INSERT INTO video_downloads (generation_id, task_id, post_id, downloadable_url, local_path, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(generation_id) DO UPDATE SET
                    task_id = excluded.task_id,
                    post_id = excluded.post_id,
                    downloadable_url = excluded.downloadable_url,
                    local_path = excluded.local_path,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&download.generation_id)
            .bind(&download.task_id)
            .bind(&download.post_id)
            .bind(&download.downloadable_url)
            .bind(&download.local_path)
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn update_refetched(
        &self,
        id: i64,
        downloadable_url: &str,
        local_path: &str,
        post_id: &str,
    ) -> Result<()> {
        if local_path.is_empty() {
            return Err(Error::validation("download local_path must not be empty"));
        }
        retry_on_sqlite_busy("update_refetched", || async {
            let result = sqlx::query(
                r#"
                UPDATE video_downloads
                SET downloadable_url = ?, local_path = ?, post_id = ?, created_at = ?
                WHERE id = ?
                "#,
            )
            .bind(downloadable_url)
            .bind(local_path)
            .bind(post_id)
            .bind(now_ms())
            .bind(id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(Error::not_found("Download", id.to_string()));
            }
            Ok(())
        })
        .await
    }

    async fn delete_for_task(&self, task_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM video_downloads WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_downloads(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM video_downloads")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
