//! Runtime configuration.
//!
//! Values come from the environment (after `.env` is loaded by the binary),
//! falling back to defaults suitable for a local desktop install.

use std::path::PathBuf;

use tracing::warn;

use crate::downloader::WatermarkSettings;
use crate::remote::DEFAULT_WATERMARK_ENDPOINT;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:accounts.db?mode=rwc";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_DRAFTS_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    /// Base URL of the remote job API, without trailing slash.
    pub api_base_url: String,
    pub download_dir: PathBuf,
    pub log_dir: PathBuf,
    pub watermark_endpoint: String,
    pub watermark_token: Option<String>,
    /// Page size used when listing drafts after a job completes.
    pub drafts_page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            watermark_endpoint: DEFAULT_WATERMARK_ENDPOINT.to_string(),
            watermark_token: None,
            drafts_page_size: DEFAULT_DRAFTS_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(base) = get("SORAPC_API_BASE_URL") {
            config.api_base_url = base;
        }
        config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();

        if let Some(dir) = get("SORAPC_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }

        if let Some(dir) = get("SORAPC_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if let Some(endpoint) = get("SORAPC_WATERMARK_ENDPOINT") {
            config.watermark_endpoint = endpoint;
        }

        config.watermark_token = get("SORAPC_WATERMARK_TOKEN");

        if let Some(limit) = get("SORAPC_DRAFTS_LIMIT") {
            match limit.parse::<u32>() {
                Ok(parsed) if parsed > 0 => config.drafts_page_size = parsed,
                _ => warn!(value = %limit, "Invalid SORAPC_DRAFTS_LIMIT, using default"),
            }
        }

        config
    }

    pub fn watermark_settings(&self) -> WatermarkSettings {
        WatermarkSettings {
            endpoint: Some(self.watermark_endpoint.clone()),
            token: self.watermark_token.clone(),
        }
    }
}
