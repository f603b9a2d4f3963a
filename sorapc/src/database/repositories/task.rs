//! Job record repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{IncompleteTask, TaskListRow, TaskResultDbModel};
use crate::database::retry::retry_on_sqlite_busy;
use crate::{Error, Result};

/// Job record repository trait.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn get_task(&self, task_id: &str) -> Result<TaskResultDbModel>;
    /// Insert or overwrite the record for `task_id`, resetting progress to 0.
    /// The original `created_at` survives an overwrite.
    async fn upsert_task(
        &self,
        task_id: &str,
        token_id: i64,
        result_json: &str,
        prompt: &str,
        created_at: i64,
    ) -> Result<()>;
    /// Raise stored progress to `percent`. Returns the number of rows changed,
    /// which is 0 for unknown ids and for updates that would lower progress.
    async fn raise_progress(&self, task_id: &str, percent: f64) -> Result<u64>;
    async fn list_incomplete(&self) -> Result<Vec<IncompleteTask>>;
    async fn list_tasks(&self) -> Result<Vec<TaskListRow>>;
    async fn delete_task(&self, task_id: &str) -> Result<u64>;
}

/// SQLx implementation of TaskRepository.
pub struct SqlxTaskRepository {
    pool: SqlitePool,
}

impl SqlxTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqlxTaskRepository {
    async fn get_task(&self, task_id: &str) -> Result<TaskResultDbModel> {
        sqlx::query_as::<_, TaskResultDbModel>("SELECT * FROM video_task_results WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Job", task_id))
    }

    async fn upsert_task(
        &self,
        task_id: &str,
        token_id: i64,
        result_json: &str,
        prompt: &str,
        created_at: i64,
    ) -> Result<()> {
        retry_on_sqlite_busy("upsert_task", || async {
            sqlx::query(
                r#"
                INSERT INTO video_task_results (task_id, token_id, result_json, progress_pct, prompt, created_at)
                VALUES (?, ?, ?, 0, ?, ?)
                ON CONFLICT(task_id) DO UPDATE SET
                    token_id = excluded.token_id,
                    result_json = excluded.result_json,
                    progress_pct = 0,
                    prompt = excluded.prompt
                "#,
            )
            .bind(task_id)
            .bind(token_id)
            .bind(result_json)
            .bind(prompt)
            .bind(created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn raise_progress(&self, task_id: &str, percent: f64) -> Result<u64> {
        retry_on_sqlite_busy("raise_progress", || async {
            let result = sqlx::query(
                r#"
                UPDATE video_task_results
                SET progress_pct = ?
                WHERE task_id = ? AND (progress_pct IS NULL OR progress_pct <= ?)
                "#,
            )
            .bind(percent)
            .bind(task_id)
            .bind(percent)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn list_incomplete(&self) -> Result<Vec<IncompleteTask>> {
        let tasks = sqlx::query_as::<_, IncompleteTask>(
            r#"
            SELECT task_id, token_id FROM video_task_results
            WHERE progress_pct < 100 OR progress_pct IS NULL
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn list_tasks(&self) -> Result<Vec<TaskListRow>> {
        let rows = sqlx::query_as::<_, TaskListRow>(
            r#"
            SELECT
                t.task_id,
                t.token_id,
                t.prompt,
                t.progress_pct,
                t.created_at,
                (
                    SELECT d.local_path FROM video_downloads d
                    WHERE d.task_id = t.task_id
                    ORDER BY d.created_at DESC, d.id DESC
                    LIMIT 1
                ) AS local_path
            FROM video_task_results t
            ORDER BY t.created_at DESC, t.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_task(&self, task_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM video_task_results WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
