//! Download pipeline.
//!
//! Two entry points share one [`DownloadPipeline`]:
//! - selective download of the single draft belonging to a finished job
//! - the publish, share-URL, watermark-removal and refetch chain
//!
//! A download record is written only after the file is fully in place.

mod fetch;
mod paths;
mod publish;
mod selective;

use std::sync::Arc;

pub use fetch::{HttpMediaFetcher, MediaFetcher, partial_path};
pub use paths::{DownloadDir, extension_from_url, sanitize_stem};
pub use publish::{PublishOutcome, WatermarkSettings};
pub use selective::RedownloadOutcome;

use crate::database::repositories::{CredentialRepository, DownloadRepository};
use crate::ledger::JobLedger;
use crate::remote::{RemoteApi, WatermarkResolver};

pub struct DownloadPipeline {
    downloads: Arc<dyn DownloadRepository>,
    credentials: Arc<dyn CredentialRepository>,
    ledger: Arc<JobLedger>,
    remote: Arc<dyn RemoteApi>,
    resolver: Arc<dyn WatermarkResolver>,
    fetcher: Arc<dyn MediaFetcher>,
    dir: DownloadDir,
}

impl DownloadPipeline {
    pub fn new(
        downloads: Arc<dyn DownloadRepository>,
        credentials: Arc<dyn CredentialRepository>,
        ledger: Arc<JobLedger>,
        remote: Arc<dyn RemoteApi>,
        resolver: Arc<dyn WatermarkResolver>,
        fetcher: Arc<dyn MediaFetcher>,
        dir: DownloadDir,
    ) -> Self {
        Self {
            downloads,
            credentials,
            ledger,
            remote,
            resolver,
            fetcher,
            dir,
        }
    }

    pub fn download_dir(&self) -> &DownloadDir {
        &self.dir
    }
}
