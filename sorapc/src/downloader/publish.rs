//! Publish, resolve the share URL, strip the watermark, refetch.
//!
//! Strictly sequential. A failed publish is advisory; the item may already
//! be published from an earlier attempt.

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::DownloadPipeline;
use crate::remote::{
    DEFAULT_WATERMARK_ENDPOINT, PublishedUrlKey, looks_like_direct_media_url, publish_failed,
    published_share_url,
};
use crate::{Error, Result};

/// Resolver endpoint and access token for watermark removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatermarkSettings {
    pub endpoint: Option<String>,
    pub token: Option<String>,
}

impl WatermarkSettings {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_WATERMARK_ENDPOINT)
    }

    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub published_url: String,
    pub resolved_url: String,
    pub local_path: String,
    pub post_id: String,
}

impl DownloadPipeline {
    #[instrument(skip(self, watermark))]
    pub async fn publish_and_fetch_unwatermarked(
        &self,
        task_id: &str,
        watermark: &WatermarkSettings,
    ) -> Result<PublishOutcome> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(Error::EmptyIdentifier("task_id"));
        }

        // 1. Prerequisites: owning credential and an earlier download.
        let task = match self.ledger.get(task_id).await {
            Ok(task) => task,
            Err(Error::NotFound { .. }) => {
                return Err(Error::prerequisite(format!("no job record for {task_id}")));
            }
            Err(e) => return Err(e),
        };
        let bearer = match self.credentials.get_credential(task.token_id).await {
            Ok(model) => model.token.trim().to_string(),
            Err(Error::NotFound { .. }) => {
                return Err(Error::prerequisite(format!(
                    "credential {} of job {task_id} no longer exists",
                    task.token_id
                )));
            }
            Err(e) => return Err(e),
        };
        if bearer.is_empty() {
            return Err(Error::prerequisite(format!(
                "credential {} has an empty bearer",
                task.token_id
            )));
        }
        let record = self
            .downloads
            .latest_for_task(task_id)
            .await?
            .ok_or_else(|| Error::prerequisite(format!("job {task_id} has not been downloaded yet")))?;
        let generation_id = record.generation_id.trim().to_string();
        if generation_id.is_empty() {
            return Err(Error::prerequisite("download record has no generation id"));
        }

        // 2. Publish (advisory).
        let publish_ok = match self
            .remote
            .publish_video(&bearer, &generation_id, &task.prompt)
            .await
        {
            Ok(response) if publish_failed(&response) => {
                warn!(response = %response, "Publish reported failure; continuing");
                false
            }
            Ok(_) => true,
            Err(error) => {
                warn!(error = %error, "Publish request failed; continuing");
                false
            }
        };

        // 3. Share URL by job id, only after a clean publish.
        let mut published_url = None;
        let mut post_id = None;
        if publish_ok {
            match self
                .remote
                .published_url(&bearer, PublishedUrlKey::Task(task_id))
                .await
            {
                Ok(response) => {
                    (published_url, post_id) = published_share_url(&response);
                    if published_url.is_none() {
                        info!("Published URL not available by job id yet");
                    }
                }
                Err(error) => warn!(error = %error, "Published URL lookup by job id failed"),
            }
        }

        // 4. Fallback by generation id.
        if published_url.is_none() {
            match self
                .remote
                .published_url(&bearer, PublishedUrlKey::Generation(&generation_id))
                .await
            {
                Ok(response) => {
                    let (url, pid) = published_share_url(&response);
                    published_url = url;
                    post_id = post_id.or(pid);
                }
                Err(error) => {
                    warn!(error = %error, "Published URL lookup by generation id failed")
                }
            }
        }
        let published_url = published_url.ok_or_else(|| Error::NoPublishedUrl {
            task_id: task_id.to_string(),
        })?;
        info!(published_url = %published_url, "Published URL resolved");

        // 5. Watermark removal unless the URL is already raw media.
        let resolved_url = if looks_like_direct_media_url(&published_url) {
            published_url.clone()
        } else {
            let token = watermark.token().ok_or(Error::WatermarkCredentialMissing)?;
            self.resolver
                .resolve(watermark.endpoint(), token, &published_url)
                .await?
                .ok_or(Error::NoWatermarkFreeUrl)?
        };

        // 6. Fetch over the existing file.
        let path = self
            .dir
            .resolve_existing(&record.local_path, &generation_id, &resolved_url)
            .ok_or_else(|| Error::prerequisite("download record has no usable path"))?;
        self.dir.ensure().await?;
        self.fetcher.fetch_to(&resolved_url, &path).await?;

        let local_path = path.display().to_string();
        let post_id = post_id.unwrap_or_else(|| published_url.clone());
        self.downloads
            .update_refetched(record.id, &resolved_url, &local_path, &post_id)
            .await?;

        info!(path = %local_path, "Watermark-free artifact stored");
        Ok(PublishOutcome {
            published_url,
            resolved_url,
            local_path,
            post_id,
        })
    }
}
