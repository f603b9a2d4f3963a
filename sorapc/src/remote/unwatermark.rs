//! Watermark removal through a third-party resolver endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use crate::utils::http_client::{LOG_BODY_LIMIT, PUBLISH_TIMEOUT, truncate_for_log};
use crate::utils::json::{find_url, parse_response_body};
use crate::{Error, Result};

/// Default resolver endpoint.
pub const DEFAULT_WATERMARK_ENDPOINT: &str = "https://api.sorai.me/get-sora-link";

/// Turns a published share URL into a watermark-free media URL.
#[async_trait]
pub trait WatermarkResolver: Send + Sync {
    /// `Ok(None)` when the resolver answered but carried no usable URL.
    async fn resolve(&self, endpoint: &str, token: &str, share_url: &str)
    -> Result<Option<String>>;
}

/// Whether `url` already points at raw media and needs no resolving.
pub fn looks_like_direct_media_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("videos.openai.com") || lower.contains(".mp4") || lower.contains("/raw")
}

pub struct HttpWatermarkResolver {
    client: Client,
}

impl HttpWatermarkResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WatermarkResolver for HttpWatermarkResolver {
    #[instrument(skip(self, token))]
    async fn resolve(
        &self,
        endpoint: &str,
        token: &str,
        share_url: &str,
    ) -> Result<Option<String>> {
        let response = self
            .client
            .post(endpoint)
            .json(&json!({ "url": share_url, "token": token }))
            .timeout(PUBLISH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), body = %truncate_for_log(&text, LOG_BODY_LIMIT), "Resolver response");

        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body: truncate_for_log(&text, LOG_BODY_LIMIT),
            });
        }
        Ok(find_url(&parse_response_body(&text, endpoint)))
    }
}
