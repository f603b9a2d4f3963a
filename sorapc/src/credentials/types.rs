//! Core credential types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::database::models::CredentialDbModel;
use crate::utils::json::{JsonContext, parse_optional};

/// Remaining video quota as last reported upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "remaining", rename_all = "snake_case")]
pub enum Quota {
    /// No snapshot yet. Admitted; the upstream service rejects if exhausted.
    Unknown,
    Known(u32),
}

impl Quota {
    /// Map a raw upstream count, where negative values mean "unknown".
    pub fn from_raw(raw: Option<i64>) -> Self {
        match raw {
            Some(n) if n >= 0 => Self::Known(u32::try_from(n).unwrap_or(u32::MAX)),
            _ => Self::Unknown,
        }
    }

    /// Unknown or strictly positive quota admits a new job.
    pub fn admits(&self) -> bool {
        match self {
            Self::Unknown => true,
            Self::Known(n) => *n > 0,
        }
    }
}

/// Key of the rate-limit object inside a cached account status.
const RATE_LIMIT_KEY: &str = "rate_limit_and_credit_balance";

/// The `rate_limit_and_credit_balance` object of an account status.
///
/// Each field is read on its own, so a malformed sibling never hides the
/// remaining count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateLimitSnapshot {
    pub estimated_num_videos_remaining: Option<i64>,
    pub access_resets_in_seconds: Option<i64>,
    pub credit_remaining: Option<f64>,
    pub rate_limit_reached: bool,
}

impl RateLimitSnapshot {
    pub fn from_value(value: &Value) -> Self {
        Self {
            estimated_num_videos_remaining: lenient_f64(value.get("estimated_num_videos_remaining"))
                .map(|n| n.floor() as i64),
            access_resets_in_seconds: lenient_f64(value.get("access_resets_in_seconds"))
                .map(|n| n as i64),
            credit_remaining: lenient_f64(value.get("credit_remaining")),
            rate_limit_reached: value
                .get("rate_limit_reached")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    pub fn quota(&self) -> Quota {
        Quota::from_raw(self.estimated_num_videos_remaining)
    }
}

impl<'de> Deserialize<'de> for RateLimitSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| Self::from_value(&v))
    }
}

/// Number that may arrive as a JSON number or a numeric string.
fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Cached account status stored in `tokens.status_json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountStatus {
    pub email: Option<String>,
    #[serde(rename = "rate_limit_and_credit_balance")]
    pub rate_limit: Option<RateLimitSnapshot>,
}

impl AccountStatus {
    pub fn from_value(value: &Value) -> Self {
        Self {
            email: value
                .get("email")
                .and_then(Value::as_str)
                .map(str::to_string),
            rate_limit: value
                .get(RATE_LIMIT_KEY)
                .filter(|v| v.is_object())
                .map(RateLimitSnapshot::from_value),
        }
    }
}

impl<'de> Deserialize<'de> for AccountStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| Self::from_value(&v))
    }
}

/// Coarse plan tier derived from the cached plan label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Unknown,
    Free,
    Plus,
    Pro,
}

impl PlanTier {
    /// Classify a plan label such as `chatgpt_plus`.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_ascii_lowercase();
        if is_pro_like(&lower) {
            Self::Pro
        } else if lower.contains("plus") {
            Self::Plus
        } else if lower.contains("free") {
            Self::Free
        } else {
            Self::Unknown
        }
    }
}

/// Case-insensitive substring match used by the pro-only filter.
pub(crate) fn is_pro_like(label: &str) -> bool {
    label.to_ascii_lowercase().contains("pro")
}

/// Per-medium concurrency limits. Negative values mean unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyLimits {
    pub image: i64,
    pub video: i64,
}

/// A credential as seen by the selector and the service layer.
#[derive(Debug, Clone, Serialize)]
pub struct Credential {
    pub id: i64,
    #[serde(skip_serializing)]
    pub bearer: String,
    pub active: bool,
    pub image_enabled: bool,
    pub video_enabled: bool,
    pub limits: ConcurrencyLimits,
    /// Raw plan label, e.g. `chatgpt_pro`. Empty until looked up.
    pub plan_label: String,
    pub remark: Option<String>,
    pub status: AccountStatus,
}

impl Credential {
    pub fn plan_tier(&self) -> PlanTier {
        PlanTier::from_label(&self.plan_label)
    }

    pub fn is_pro_like(&self) -> bool {
        is_pro_like(&self.plan_label)
    }

    pub fn quota(&self) -> Quota {
        self.status
            .rate_limit
            .as_ref()
            .map(RateLimitSnapshot::quota)
            .unwrap_or(Quota::Unknown)
    }

    pub fn has_bearer(&self) -> bool {
        !self.bearer.trim().is_empty()
    }
}

impl From<CredentialDbModel> for Credential {
    fn from(model: CredentialDbModel) -> Self {
        let status = parse_optional::<AccountStatus>(
            model.status_json.as_deref(),
            JsonContext::CredentialField {
                credential_id: model.id,
                field: "status_json",
            },
            "Ignoring unparseable credential status",
        )
        .unwrap_or_default();

        Self {
            id: model.id,
            bearer: model.token,
            active: model.is_active,
            image_enabled: model.image_enabled,
            video_enabled: model.video_enabled,
            limits: ConcurrencyLimits {
                image: model.image_concurrency,
                video: model.video_concurrency,
            },
            plan_label: model.plan_type,
            remark: model.remark,
            status,
        }
    }
}
