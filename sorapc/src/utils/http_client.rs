use std::{sync::OnceLock, time::Duration};

use tracing::debug;

use crate::Result;

/// Browser-like User-Agent sent on media transfers.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Short timeout for status, listing and progress calls.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(30);
/// Medium timeout for job creation and the publish chain.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(60);
/// Long timeout for media transfers.
pub const MEDIA_TIMEOUT: Duration = Duration::from_secs(120);

/// Upstream response bodies are cut to this many characters in logs and errors.
pub const LOG_BODY_LIMIT: usize = 2000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the shared `reqwest::Client`.
///
/// No client-wide request timeout is set; each call applies its own.
pub fn build_client() -> Result<reqwest::Client> {
    install_rustls_provider();

    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()?;
    Ok(client)
}

/// Truncate a response body for logging.
pub fn truncate_for_log(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...(truncated)", &body[..idx]),
        None => body.to_string(),
    }
}
