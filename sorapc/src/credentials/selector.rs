//! Token selection for new jobs.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use serde::Serialize;
use tracing::{debug, instrument};

use super::types::Credential;
use crate::database::repositories::CredentialRepository;
use crate::{Error, Result};

/// Identity and bearer of the credential chosen for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedCredential {
    pub credential_id: i64,
    #[serde(skip_serializing)]
    pub bearer: String,
}

/// Filter credentials down to those that may start a video job.
///
/// Checks the active and video flags as well, so any credential list works.
pub fn eligible_candidates(credentials: &[Credential], require_pro: bool) -> Vec<&Credential> {
    credentials
        .iter()
        .filter(|c| c.active && c.video_enabled)
        .filter(|c| !require_pro || c.is_pro_like())
        .filter(|c| c.has_bearer())
        .filter(|c| c.quota().admits())
        .collect()
}

/// Picks one usable credential uniformly at random. Read-only.
pub struct TokenSelector {
    repo: Arc<dyn CredentialRepository>,
}

impl TokenSelector {
    pub fn new(repo: Arc<dyn CredentialRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self))]
    pub async fn select(&self, require_pro: bool) -> Result<SelectedCredential> {
        let credentials: Vec<Credential> = self
            .repo
            .list_video_candidates()
            .await?
            .into_iter()
            .map(Credential::from)
            .collect();

        let eligible = eligible_candidates(&credentials, require_pro);
        debug!(
            candidates = credentials.len(),
            eligible = eligible.len(),
            "Filtered credentials"
        );

        let chosen = eligible
            .choose(&mut rand::rng())
            .ok_or(Error::NoEligibleCredential { require_pro })?;

        Ok(SelectedCredential {
            credential_id: chosen.id,
            bearer: chosen.bearer.trim().to_string(),
        })
    }

    /// Bearer of a specific credential, used when resuming a job.
    pub async fn bearer_for(&self, credential_id: i64) -> Result<String> {
        let model = self.repo.get_credential(credential_id).await?;
        let bearer = model.token.trim();
        if bearer.is_empty() {
            return Err(Error::EmptyIdentifier("credential bearer"));
        }
        Ok(bearer.to_string())
    }
}
