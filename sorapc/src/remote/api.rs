use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::json::{find_url, non_blank_str};
use crate::{Error, Result};

/// Default clip length in frames (about 10 seconds).
pub const DEFAULT_N_FRAMES: u32 = 300;

/// Operations of the remote job API.
///
/// Every call carries the bearer credential in the JSON body.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// `POST /videos`. Returns the raw response body for the ledger.
    async fn create_video(&self, bearer: &str, request: &CreateVideoRequest) -> Result<String>;
    /// `POST /pending`.
    async fn pending(&self, bearer: &str) -> Result<Value>;
    /// `POST /drafts`.
    async fn drafts(&self, bearer: &str, limit: u32, offset: u32) -> Result<DraftsPage>;
    /// `POST /account/status`.
    async fn account_status(&self, bearer: &str) -> Result<Value>;
    /// `POST /account/subscriptions`.
    async fn subscriptions(&self, bearer: &str) -> Result<Value>;
    /// `POST /publish-video`.
    async fn publish_video(&self, bearer: &str, generation_id: &str, prompt: &str)
    -> Result<Value>;
    /// `POST /get-published-video-url`.
    async fn published_url(&self, bearer: &str, key: PublishedUrlKey<'_>) -> Result<Value>;
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Parameters for a new video job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVideoRequest {
    pub prompt: String,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default = "default_n_frames")]
    pub n_frames: u32,
}

fn default_n_frames() -> u32 {
    DEFAULT_N_FRAMES
}

impl CreateVideoRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            orientation: Orientation::default(),
            n_frames: DEFAULT_N_FRAMES,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_n_frames(mut self, n_frames: u32) -> Self {
        if n_frames > 0 {
            self.n_frames = n_frames;
        }
        self
    }
}

/// How the published-URL lookup identifies the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishedUrlKey<'a> {
    Task(&'a str),
    Generation(&'a str),
}

impl PublishedUrlKey<'_> {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Task(_) => "task_id",
            Self::Generation(_) => "generation_id",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Task(v) | Self::Generation(v) => v,
        }
    }
}

/// One entry of the drafts listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub generation_id: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub downloadable_url: String,
    #[serde(default)]
    pub prompt: String,
}

impl DraftItem {
    /// Artifact identifier, falling back to the draft's own id.
    pub fn generation_key(&self) -> Option<&str> {
        [self.generation_id.trim(), self.id.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftsPage {
    #[serde(default)]
    pub items: Vec<DraftItem>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Interpretation of a `/pending` response for one credential.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingStatus {
    /// Nothing pending for the credential.
    Complete,
    /// Progress in percent (0-100).
    InProgress(f64),
}

impl PendingStatus {
    /// An empty list (bare or under `tasks`) means the job finished.
    /// Otherwise the first entry's `progress_pct` is used; values at or
    /// below 1 are fractions.
    pub fn from_response(value: &Value) -> Result<Self> {
        let tasks = match value {
            Value::Array(list) => list,
            Value::Object(map) => match map.get("tasks") {
                Some(Value::Array(list)) => list,
                _ => {
                    return Err(Error::malformed(
                        "pending response has neither a list nor a tasks array",
                    ));
                }
            },
            _ => return Err(Error::malformed("pending response is not a list")),
        };

        let Some(first) = tasks.first() else {
            return Ok(Self::Complete);
        };

        let raw = first
            .get("progress_pct")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let pct = if raw <= 1.0 { raw * 100.0 } else { raw };
        Ok(Self::InProgress(pct.clamp(0.0, 100.0)))
    }

    pub fn is_done(&self) -> bool {
        match self {
            Self::Complete => true,
            Self::InProgress(pct) => *pct >= 100.0,
        }
    }
}

/// Whether a publish response signals failure: an `error` field or a
/// conflict marker in `message`.
pub fn publish_failed(response: &Value) -> bool {
    if response.get("error").is_some_and(|v| !v.is_null()) {
        return true;
    }
    response
        .get("message")
        .and_then(Value::as_str)
        .is_some_and(|m| m.contains("409"))
}

/// Extract `(share_url, post_id)` from a published-URL response.
///
/// `share_url` wins over any URL found by the generic search. A
/// `status: pending` response without a URL yields `None`.
pub fn published_share_url(response: &Value) -> (Option<String>, Option<String>) {
    let post_id = non_blank_str(response, "post_id").map(str::to_string);
    let url = non_blank_str(response, "share_url")
        .map(str::to_string)
        .or_else(|| find_url(response));
    (url, post_id)
}
