//! Credential store and token selection.
//!
//! - [`Credential`]: a stored bearer token with its capability flags and the
//!   last-known rate-limit snapshot
//! - [`TokenSelector`]: picks a credential for a new job
//! - [`CredentialService`]: add/import/edit/test/list operations

mod plan;
mod selector;
mod service;
mod types;

pub use plan::parse_plan_type;
pub use selector::{SelectedCredential, TokenSelector, eligible_candidates};
pub use service::{CredentialPage, CredentialService, CredentialSummary, TestOutcome};
pub use types::{AccountStatus, ConcurrencyLimits, Credential, PlanTier, Quota, RateLimitSnapshot};
