//! Media transfer to local files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::utils::fs::{ensure_parent_dir, remove_file_quietly};
use crate::utils::http_client::{BROWSER_USER_AGENT, MEDIA_TIMEOUT};
use crate::{Error, Result};

/// Downloads a URL into a local file.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Transfer `url` to `dest`, replacing any existing file. On failure
    /// `dest` is left as it was and no partial file remains. Returns the
    /// number of bytes written.
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Sibling path used while a transfer is in flight.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn stream_into(&self, url: &str, part: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .timeout(MEDIA_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::download_failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::download_failed(format!("HTTP {}", status.as_u16())));
        }

        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| Error::download_failed(format!("creating {}: {e}", part.display())))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| Error::download_failed(format!("transfer interrupted: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::download_failed(format!("writing {}: {e}", part.display())))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| Error::download_failed(format!("flushing {}: {e}", part.display())))?;

        Ok(written)
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64> {
        ensure_parent_dir(dest).await?;
        let part = partial_path(dest);

        let written = match self.stream_into(url, &part).await {
            Ok(written) => written,
            Err(error) => {
                warn!(error = %error, "Transfer failed; removing partial file");
                remove_file_quietly(&part).await;
                return Err(error);
            }
        };

        if let Err(e) = tokio::fs::rename(&part, dest).await {
            remove_file_quietly(&part).await;
            return Err(Error::download_failed(format!(
                "moving into {}: {e}",
                dest.display()
            )));
        }

        debug!(bytes = written, "Transfer complete");
        Ok(written)
    }
}
