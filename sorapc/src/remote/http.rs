//! reqwest-backed [`RemoteApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use super::api::{CreateVideoRequest, DraftsPage, PublishedUrlKey, RemoteApi};
use crate::utils::http_client::{
    LOG_BODY_LIMIT, PUBLISH_TIMEOUT, STATUS_TIMEOUT, truncate_for_log,
};
use crate::utils::json::parse_response_body;
use crate::{Error, Result};

/// Fixed render size sent on job creation.
const VIDEO_SIZE: &str = "small";
/// Remote model identifier sent on job creation.
const VIDEO_MODEL: &str = "sy_8";

pub struct HttpRemoteApi {
    client: Client,
    base_url: String,
}

impl HttpRemoteApi {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and return the raw response text on 2xx.
    async fn post_raw(&self, path: &str, body: &Value, timeout: Duration) -> Result<String> {
        let url = self.endpoint(path);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(
            url = %url,
            status = status.as_u16(),
            body = %truncate_for_log(&text, LOG_BODY_LIMIT),
            "Response"
        );

        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body: truncate_for_log(&text, LOG_BODY_LIMIT),
            });
        }
        Ok(text)
    }

    async fn post_value(&self, path: &str, body: &Value, timeout: Duration) -> Result<Value> {
        let text = self.post_raw(path, body, timeout).await?;
        Ok(parse_response_body(&text, path))
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    #[instrument(skip(self, bearer), fields(orientation = %request.orientation, n_frames = request.n_frames))]
    async fn create_video(&self, bearer: &str, request: &CreateVideoRequest) -> Result<String> {
        info!("Creating video job");
        let body = json!({
            "bearer_token": bearer,
            "prompt": request.prompt,
            "orientation": request.orientation,
            "size": VIDEO_SIZE,
            "n_frames": request.n_frames,
            "model": VIDEO_MODEL,
        });
        self.post_raw("/videos", &body, PUBLISH_TIMEOUT).await
    }

    #[instrument(skip_all)]
    async fn pending(&self, bearer: &str) -> Result<Value> {
        let body = json!({ "bearer_token": bearer });
        let text = self.post_raw("/pending", &body, STATUS_TIMEOUT).await?;
        Ok(serde_json::from_str(&text)?)
    }

    #[instrument(skip(self, bearer))]
    async fn drafts(&self, bearer: &str, limit: u32, offset: u32) -> Result<DraftsPage> {
        let body = json!({
            "bearer_token": bearer,
            "limit": limit,
            "offset": offset,
        });
        let text = self.post_raw("/drafts", &body, STATUS_TIMEOUT).await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::malformed(format!("drafts response: {e}")))
    }

    #[instrument(skip_all)]
    async fn account_status(&self, bearer: &str) -> Result<Value> {
        let body = json!({ "bearer_token": bearer });
        let text = self.post_raw("/account/status", &body, STATUS_TIMEOUT).await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::malformed(format!("account status response: {e}")))
    }

    #[instrument(skip_all)]
    async fn subscriptions(&self, bearer: &str) -> Result<Value> {
        let body = json!({ "bearer_token": bearer });
        self.post_value("/account/subscriptions", &body, STATUS_TIMEOUT)
            .await
    }

    #[instrument(skip(self, bearer, prompt))]
    async fn publish_video(
        &self,
        bearer: &str,
        generation_id: &str,
        prompt: &str,
    ) -> Result<Value> {
        let body = json!({
            "bearer_token": bearer,
            "generation_id": generation_id,
            "prompt": prompt.trim(),
        });
        self.post_value("/publish-video", &body, PUBLISH_TIMEOUT)
            .await
    }

    #[instrument(skip(self, bearer), fields(key = key.field(), id = key.value()))]
    async fn published_url(&self, bearer: &str, key: PublishedUrlKey<'_>) -> Result<Value> {
        let mut body = json!({ "bearer_token": bearer });
        body[key.field()] = Value::String(key.value().to_string());
        self.post_value("/get-published-video-url", &body, PUBLISH_TIMEOUT)
            .await
    }
}
