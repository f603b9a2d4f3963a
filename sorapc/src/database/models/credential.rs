//! Credential (token) database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Default per-credential image concurrency (negative means unlimited).
pub const DEFAULT_IMAGE_CONCURRENCY: i64 = -1;
/// Default per-credential video concurrency.
pub const DEFAULT_VIDEO_CONCURRENCY: i64 = 3;

/// A stored bearer credential.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CredentialDbModel {
    pub id: i64,
    pub token: String,
    pub is_active: bool,
    pub remark: Option<String>,
    pub image_enabled: bool,
    pub video_enabled: bool,
    pub image_concurrency: i64,
    pub video_concurrency: i64,
    /// Last account-status payload, including `rate_limit_and_credit_balance`.
    pub status_json: Option<String>,
    /// Cached plan label derived from the subscriptions lookup.
    pub plan_type: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields accepted when creating or editing a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInput {
    pub token: String,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default = "default_true")]
    pub image_enabled: bool,
    #[serde(default = "default_true")]
    pub video_enabled: bool,
    #[serde(default = "default_image_concurrency")]
    pub image_concurrency: i64,
    #[serde(default = "default_video_concurrency")]
    pub video_concurrency: i64,
}

impl CredentialInput {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            remark: None,
            image_enabled: true,
            video_enabled: true,
            image_concurrency: DEFAULT_IMAGE_CONCURRENCY,
            video_concurrency: DEFAULT_VIDEO_CONCURRENCY,
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn with_video_enabled(mut self, enabled: bool) -> Self {
        self.video_enabled = enabled;
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_image_concurrency() -> i64 {
    DEFAULT_IMAGE_CONCURRENCY
}

fn default_video_concurrency() -> i64 {
    DEFAULT_VIDEO_CONCURRENCY
}
