//! Download directory layout. Every path handed out stays inside the root.

use std::path::{Component, Path, PathBuf};

use crate::Result;
use crate::utils::fs::ensure_dir_all_with_op;

const DEFAULT_EXTENSION: &str = "mp4";
const MAX_EXTENSION_LEN: usize = 5;

#[derive(Debug, Clone)]
pub struct DownloadDir {
    root: PathBuf,
}

/// Reduce an identifier to a safe file stem. `None` if nothing usable remains.
pub fn sanitize_stem(id: &str) -> Option<String> {
    let stem: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_string())
}

/// File extension taken from the URL path, defaulting to `mp4`.
pub fn extension_from_url(url: &str) -> String {
    url::Url::parse(url.trim())
        .ok()
        .and_then(|u| {
            let last = u.path_segments()?.next_back()?.to_string();
            let (_, ext) = last.rsplit_once('.')?;
            let ext = ext.to_ascii_lowercase();
            let valid = !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric());
            valid.then_some(ext)
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

impl DownloadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> Result<()> {
        ensure_dir_all_with_op("creating download directory", &self.root).await
    }

    /// `<root>/<generation_id>.<ext>`.
    pub fn path_for(&self, generation_id: &str, url: &str) -> Option<PathBuf> {
        let stem = sanitize_stem(generation_id)?;
        Some(
            self.root
                .join(format!("{}.{}", stem, extension_from_url(url))),
        )
    }

    /// Lexical containment check; the file need not exist.
    pub fn contains(&self, path: &Path) -> bool {
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return false;
        }
        path.starts_with(&self.root) && path != self.root
    }

    /// Reuse a recorded path when it lies inside the root, otherwise compute
    /// the default one.
    pub fn resolve_existing(
        &self,
        recorded: &str,
        generation_id: &str,
        url: &str,
    ) -> Option<PathBuf> {
        let recorded = recorded.trim();
        if !recorded.is_empty() {
            let path = PathBuf::from(recorded);
            if self.contains(&path) {
                return Some(path);
            }
            tracing::warn!(path = %recorded, "Recorded path is outside the download directory; ignoring");
        }
        self.path_for(generation_id, url)
    }
}
