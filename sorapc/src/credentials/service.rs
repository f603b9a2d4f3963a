//! Credential management operations.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::plan::parse_plan_type;
use super::types::{Credential, PlanTier, Quota};
use crate::database::models::CredentialInput;
use crate::database::repositories::CredentialRepository;
use crate::remote::RemoteApi;
use crate::{Error, Result};

const DEFAULT_PAGE_SIZE: i64 = 20;

/// Listing row for the management view, bearer included.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub id: i64,
    pub token: String,
    pub is_active: bool,
    pub remark: Option<String>,
    pub image_enabled: bool,
    pub video_enabled: bool,
    pub image_concurrency: i64,
    pub video_concurrency: i64,
    pub email: Option<String>,
    pub plan_type: String,
    pub plan_tier: PlanTier,
    pub remaining: Quota,
    pub access_resets_in_seconds: Option<i64>,
}

impl From<Credential> for CredentialSummary {
    fn from(c: Credential) -> Self {
        let remaining = c.quota();
        let plan_tier = c.plan_tier();
        let resets = c
            .status
            .rate_limit
            .as_ref()
            .and_then(|r| r.access_resets_in_seconds);
        Self {
            id: c.id,
            token: c.bearer,
            is_active: c.active,
            remark: c.remark,
            image_enabled: c.image_enabled,
            video_enabled: c.video_enabled,
            image_concurrency: c.limits.image,
            video_concurrency: c.limits.video,
            email: c.status.email,
            plan_type: c.plan_label,
            plan_tier,
            remaining,
            access_resets_in_seconds: resets,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialPage {
    pub items: Vec<CredentialSummary>,
    pub total: i64,
}

/// Result of an account check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub credential_id: i64,
    pub email: Option<String>,
    pub plan_type: Option<String>,
}

pub struct CredentialService {
    repo: Arc<dyn CredentialRepository>,
    remote: Arc<dyn RemoteApi>,
}

impl CredentialService {
    pub fn new(repo: Arc<dyn CredentialRepository>, remote: Arc<dyn RemoteApi>) -> Self {
        Self { repo, remote }
    }

    fn validate(input: &CredentialInput) -> Result<()> {
        if input.token.trim().is_empty() {
            return Err(Error::EmptyIdentifier("token"));
        }
        Ok(())
    }

    /// Add a credential, optionally with an already-fetched account status,
    /// then look up its plan. A failed plan lookup leaves the label empty.
    #[instrument(skip_all)]
    pub async fn add(&self, input: &CredentialInput, status_json: Option<&str>) -> Result<i64> {
        Self::validate(input)?;
        let id = self.repo.create_credential(input, status_json).await?;
        info!(credential_id = id, "Credential added");
        self.refresh_plan(id, input.token.trim()).await;
        Ok(id)
    }

    /// Bulk import bare tokens with default settings. Blank lines are skipped.
    /// Returns the number imported.
    #[instrument(skip_all, fields(count = tokens.len()))]
    pub async fn import(&self, tokens: &[String]) -> Result<usize> {
        let mut imported = 0;
        for token in tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            match self
                .repo
                .create_credential(&CredentialInput::new(token), None)
                .await
            {
                Ok(_) => imported += 1,
                Err(error) => warn!(error = %error, "Skipping token that failed to import"),
            }
        }
        info!(imported, "Tokens imported");
        Ok(imported)
    }

    pub async fn update(&self, id: i64, input: &CredentialInput) -> Result<()> {
        Self::validate(input)?;
        self.repo.update_credential(id, input).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.repo.delete_credential(id).await
    }

    pub async fn delete_many(&self, ids: &[i64]) -> Result<u64> {
        self.repo.delete_credentials(ids).await
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        self.repo.set_active(id, active).await
    }

    pub async fn set_active_many(&self, ids: &[i64], active: bool) -> Result<u64> {
        self.repo.set_active_many(ids, active).await
    }

    pub async fn get(&self, id: i64) -> Result<Credential> {
        Ok(self.repo.get_credential(id).await?.into())
    }

    /// One page of credentials, 1-based. Non-positive inputs fall back to
    /// page 1 and the default size.
    pub async fn list(&self, page: i64, limit: i64) -> Result<CredentialPage> {
        let page = page.max(1);
        let limit = if limit < 1 { DEFAULT_PAGE_SIZE } else { limit };
        let total = self.repo.count_credentials().await?;
        let items = self
            .repo
            .list_credentials((page - 1) * limit, limit)
            .await?
            .into_iter()
            .map(|m| CredentialSummary::from(Credential::from(m)))
            .collect();
        Ok(CredentialPage { items, total })
    }

    /// Fetch the account status, cache it, and refresh the plan label.
    #[instrument(skip(self))]
    pub async fn test(&self, id: i64) -> Result<TestOutcome> {
        let model = self.repo.get_credential(id).await?;
        let bearer = model.token.trim().to_string();
        if bearer.is_empty() {
            return Err(Error::EmptyIdentifier("credential bearer"));
        }

        let status = self.remote.account_status(&bearer).await?;
        self.repo
            .update_status_json(id, &serde_json::to_string(&status)?)
            .await?;
        let email = status
            .get("email")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        let plan_type = self.refresh_plan(id, &bearer).await;
        info!(credential_id = id, email = ?email, plan = ?plan_type, "Credential tested");

        Ok(TestOutcome {
            credential_id: id,
            email,
            plan_type,
        })
    }

    /// Test several credentials; individual failures are logged and skipped.
    pub async fn test_many(&self, ids: &[i64]) -> Vec<TestOutcome> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.test(id).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => warn!(credential_id = id, error = %error, "Credential test failed"),
            }
        }
        outcomes
    }

    async fn refresh_plan(&self, id: i64, bearer: &str) -> Option<String> {
        let response = match self.remote.subscriptions(bearer).await {
            Ok(response) => response,
            Err(error) => {
                warn!(credential_id = id, error = %error, "Subscription lookup failed");
                return None;
            }
        };
        let plan = parse_plan_type(&response)?;
        if let Err(error) = self.repo.update_plan_type(id, &plan).await {
            warn!(credential_id = id, error = %error, "Failed to store plan type");
            return None;
        }
        debug!(credential_id = id, plan = %plan, "Plan type updated");
        Some(plan)
    }
}
