//! Credential repository.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::database::models::{CredentialDbModel, CredentialInput};
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;
use crate::{Error, Result};

/// Credential repository trait.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn get_credential(&self, id: i64) -> Result<CredentialDbModel>;
    async fn list_credentials(&self, offset: i64, limit: i64) -> Result<Vec<CredentialDbModel>>;
    async fn count_credentials(&self) -> Result<i64>;
    /// Active, video-enabled credentials. Further filtering is the selector's job.
    async fn list_video_candidates(&self) -> Result<Vec<CredentialDbModel>>;
    async fn create_credential(&self, input: &CredentialInput, status_json: Option<&str>)
    -> Result<i64>;
    async fn update_credential(&self, id: i64, input: &CredentialInput) -> Result<()>;
    async fn delete_credential(&self, id: i64) -> Result<()>;
    async fn delete_credentials(&self, ids: &[i64]) -> Result<u64>;
    async fn set_active(&self, id: i64, active: bool) -> Result<()>;
    async fn set_active_many(&self, ids: &[i64], active: bool) -> Result<u64>;
    async fn update_status_json(&self, id: i64, status_json: &str) -> Result<()>;
    async fn update_plan_type(&self, id: i64, plan_type: &str) -> Result<()>;
    /// Replace the `rate_limit_and_credit_balance` object inside `status_json` wholesale.
    async fn replace_rate_limit(&self, id: i64, rate_limit_json: &str) -> Result<()>;
}

/// SQLx implementation of CredentialRepository.
pub struct SqlxCredentialRepository {
    pool: SqlitePool,
}

impl SqlxCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn ensure_affected(rows: u64, id: i64) -> Result<()> {
        if rows == 0 {
            return Err(Error::not_found("Credential", id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for SqlxCredentialRepository {
    async fn get_credential(&self, id: i64) -> Result<CredentialDbModel> {
        sqlx::query_as::<_, CredentialDbModel>("SELECT * FROM tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Credential", id.to_string()))
    }

    async fn list_credentials(&self, offset: i64, limit: i64) -> Result<Vec<CredentialDbModel>> {
        let credentials = sqlx::query_as::<_, CredentialDbModel>(
            "SELECT * FROM tokens ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(credentials)
    }

    async fn count_credentials(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_video_candidates(&self) -> Result<Vec<CredentialDbModel>> {
        let credentials = sqlx::query_as::<_, CredentialDbModel>(
            "SELECT * FROM tokens WHERE is_active = 1 AND video_enabled = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(credentials)
    }

    async fn create_credential(
        &self,
        input: &CredentialInput,
        status_json: Option<&str>,
    ) -> Result<i64> {
        let now = now_ms();
        let result = sqlx::query(
            r#"
            INSERT INTO tokens (
                token, is_active, remark, image_enabled, video_enabled,
                image_concurrency, video_concurrency, status_json, created_at, updated_at
            ) VALUES (?, 1, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.token.trim())
        .bind(input.remark.as_deref().filter(|r| !r.is_empty()))
        .bind(input.image_enabled)
        .bind(input.video_enabled)
        .bind(input.image_concurrency)
        .bind(input.video_concurrency)
        .bind(status_json.filter(|s| !s.trim().is_empty()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_credential(&self, id: i64, input: &CredentialInput) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tokens SET
                token = ?,
                remark = ?,
                image_enabled = ?,
                video_enabled = ?,
                image_concurrency = ?,
                video_concurrency = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.token.trim())
        .bind(input.remark.as_deref().filter(|r| !r.is_empty()))
        .bind(input.image_enabled)
        .bind(input.video_enabled)
        .bind(input.image_concurrency)
        .bind(input.video_concurrency)
        .bind(now_ms())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Self::ensure_affected(result.rows_affected(), id)
    }

    async fn delete_credential(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_credentials(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM tokens WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE tokens SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now_ms())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Self::ensure_affected(result.rows_affected(), id)
    }

    async fn set_active_many(&self, ids: &[i64], active: bool) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE tokens SET is_active = ");
        qb.push_bind(active);
        qb.push(", updated_at = ");
        qb.push_bind(now_ms());
        qb.push(" WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn update_status_json(&self, id: i64, status_json: &str) -> Result<()> {
        retry_on_sqlite_busy("update_status_json", || async {
            sqlx::query("UPDATE tokens SET status_json = ?, updated_at = ? WHERE id = ?")
                .bind(status_json)
                .bind(now_ms())
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn update_plan_type(&self, id: i64, plan_type: &str) -> Result<()> {
        sqlx::query("UPDATE tokens SET plan_type = ?, updated_at = ? WHERE id = ?")
            .bind(plan_type)
            .bind(now_ms())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_rate_limit(&self, id: i64, rate_limit_json: &str) -> Result<()> {
        retry_on_sqlite_busy("replace_rate_limit", || async {
            sqlx::query(
                r#"
                UPDATE tokens
                SET status_json = json_set(
                        CASE WHEN json_valid(status_json) THEN status_json ELSE '{}' END,
                        '$.rate_limit_and_credit_balance',
                        json(?)
                    ),
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(rate_limit_json)
            .bind(now_ms())
            .bind(id)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }
}
