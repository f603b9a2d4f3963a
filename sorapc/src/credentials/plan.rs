//! Plan label derivation from `/account/subscriptions`.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
struct Subscriptions {
    #[serde(default)]
    data: Vec<Subscription>,
}

#[derive(Debug, Default, Deserialize)]
struct Subscription {
    #[serde(default)]
    plan: Plan,
}

#[derive(Debug, Default, Deserialize)]
struct Plan {
    #[serde(default)]
    id: String,
    #[serde(default)]
    rank: i64,
}

/// Highest-ranked plan id with a non-empty id, falling back to the first
/// entry's id. `None` when the response carries no plan at all.
pub fn parse_plan_type(response: &Value) -> Option<String> {
    let subs = Subscriptions::deserialize(response).ok()?;

    let best = subs
        .data
        .iter()
        // Reversed so ties resolve to the earliest entry.
        .rev()
        .filter(|s| !s.plan.id.is_empty())
        .max_by_key(|s| s.plan.rank)
        .map(|s| s.plan.id.clone());

    best.or_else(|| {
        subs.data
            .first()
            .map(|s| s.plan.id.clone())
            .filter(|id| !id.is_empty())
    })
}
