use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::DownloadPipeline;
use crate::database::models::DownloadUpsert;
use crate::remote::DraftItem;
use crate::utils::fs::{io_error, remove_file_if_exists};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedownloadOutcome {
    pub local_path: String,
    pub downloadable_url: String,
}

impl DownloadPipeline {
    /// Download the one draft whose job id equals `target_task_id`.
    ///
    /// Other drafts are ignored regardless of how many the listing returns.
    /// A blank target downloads nothing. Returns the number of files written
    /// (0 or 1); a failed transfer is an error and leaves no record.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn selective_download(
        &self,
        candidates: &[DraftItem],
        target_task_id: &str,
    ) -> Result<usize> {
        let target = target_task_id.trim();
        if target.is_empty() {
            debug!("No target job given; skipping download");
            return Ok(0);
        }

        let Some(item) = candidates.iter().find(|d| d.task_id.trim() == target) else {
            info!("Target job not present in drafts; nothing to download");
            return Ok(0);
        };

        let Some(generation_id) = item.generation_key() else {
            warn!("Draft has neither generation id nor id; skipping");
            return Ok(0);
        };
        let url = item.downloadable_url.trim();
        if url.is_empty() {
            warn!(generation_id, "Draft has no downloadable URL yet; skipping");
            return Ok(0);
        }

        let Some(path) = self.dir.path_for(generation_id, url) else {
            warn!(generation_id, "Generation id yields no usable file name; skipping");
            return Ok(0);
        };
        self.dir.ensure().await?;

        let bytes = self.fetcher.fetch_to(url, &path).await?;

        self.downloads
            .upsert_download(&DownloadUpsert {
                generation_id: generation_id.to_string(),
                task_id: target.to_string(),
                post_id: String::new(),
                downloadable_url: url.to_string(),
                local_path: path.display().to_string(),
            })
            .await?;

        info!(generation_id, path = %path.display(), bytes, "Draft downloaded");
        Ok(1)
    }

    /// Fetch the most recent artifact of a job again from its recorded URL.
    #[instrument(skip(self))]
    pub async fn redownload(&self, task_id: &str) -> Result<RedownloadOutcome> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(Error::EmptyIdentifier("task_id"));
        }
        let record = self
            .downloads
            .latest_for_task(task_id)
            .await?
            .ok_or_else(|| Error::not_found("Download", task_id))?;

        let url = record
            .downloadable_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::prerequisite("download record has no source URL"))?
            .to_string();

        let path = self
            .dir
            .resolve_existing(&record.local_path, &record.generation_id, &url)
            .ok_or_else(|| Error::prerequisite("download record has no usable path"))?;
        self.dir.ensure().await?;

        self.fetcher.fetch_to(&url, &path).await?;
        let local_path = path.display().to_string();
        self.downloads
            .update_refetched(record.id, &url, &local_path, &record.post_id)
            .await?;

        info!(path = %local_path, "Artifact downloaded again");
        Ok(RedownloadOutcome {
            local_path,
            downloadable_url: url,
        })
    }

    /// Delete the job's download records, optionally unlinking their files.
    /// Only files inside the download directory are touched.
    pub async fn purge_task(&self, task_id: &str, delete_files: bool) -> Result<u64> {
        if delete_files {
            for record in self.downloads.list_for_task(task_id).await? {
                let path = PathBuf::from(record.local_path.trim());
                if !self.dir.contains(&path) {
                    warn!(path = %path.display(), "Not deleting file outside the download directory");
                    continue;
                }
                if remove_file_if_exists(&path).await? {
                    debug!(path = %path.display(), "Removed downloaded file");
                }
            }
        }
        self.downloads.delete_for_task(task_id).await
    }

    /// Remove every file directly inside the download directory and all
    /// download records. Returns the number of files removed.
    #[instrument(skip(self))]
    pub async fn clear_downloads(&self) -> Result<usize> {
        let root = self.dir.root();
        let mut removed = 0;
        match tokio::fs::read_dir(root).await {
            Ok(mut entries) => {
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| io_error("reading directory", root, e))?
                {
                    let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
                    if !is_file {
                        continue;
                    }
                    match tokio::fs::remove_file(entry.path()).await {
                        Ok(()) => removed += 1,
                        Err(error) => {
                            warn!(path = %entry.path().display(), error = %error, "Failed to remove file")
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("reading directory", root, e)),
        }

        let records = self.downloads.clear_downloads().await?;
        info!(removed_files = removed, records, "Downloads cleared");
        Ok(removed)
    }

    /// Job id to local path, newest record per job.
    pub async fn downloads_map(&self) -> Result<HashMap<String, String>> {
        let mut map = HashMap::new();
        for record in self.downloads.list_downloads().await? {
            let Some(task_id) = record.task_id.as_deref().map(str::trim) else {
                continue;
            };
            if task_id.is_empty() || record.local_path.trim().is_empty() {
                continue;
            }
            map.entry(task_id.to_string())
                .or_insert_with(|| record.local_path.clone());
        }
        Ok(map)
    }
}
