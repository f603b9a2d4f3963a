//! JSON helpers: warning-logged parsing and bounded URL discovery in
//! loosely-shaped upstream responses.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Keys that may directly carry a URL, in lookup order.
const URL_KEYS: &[&str] = &[
    "url",
    "download_link",
    "downloadable_url",
    "published_url",
    "video_url",
    "link",
];

/// Container keys searched when no direct URL key is present.
const CONTAINER_KEYS: &[&str] = &["data", "result", "item"];

/// List key whose object elements are searched in order.
const LIST_KEY: &str = "items";

/// Maximum nesting followed by [`find_url`].
pub const MAX_URL_SEARCH_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy)]
pub enum JsonContext<'a> {
    CredentialField { credential_id: i64, field: &'static str },
    Response { endpoint: &'a str },
}

fn warn_parse_error(
    raw_len: usize,
    error: serde_json::Error,
    ctx: JsonContext<'_>,
    msg: &'static str,
) {
    match ctx {
        JsonContext::CredentialField {
            credential_id,
            field,
        } => {
            warn!(credential_id, field, raw_len, error = %error, "{msg}");
        }
        JsonContext::Response { endpoint } => {
            warn!(endpoint = %endpoint, raw_len, error = %error, "{msg}");
        }
    }
}

pub fn parse_optional<T: DeserializeOwned>(
    raw: Option<&str>,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> Option<T> {
    let raw = raw?;
    // Empty means "no value" and is not worth a warning.
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn_parse_error(raw.len(), error, ctx, msg);
            None
        }
    }
}

/// Parse a response body as JSON, keeping non-JSON bodies as `{"raw": body}`.
pub fn parse_response_body(raw: &str, endpoint: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(error) => {
            warn_parse_error(
                raw.len(),
                error,
                JsonContext::Response { endpoint },
                "Response body is not JSON",
            );
            serde_json::json!({ "raw": raw })
        }
    }
}

/// Non-blank, trimmed string at `key`.
pub fn non_blank_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Depth-first search for a URL-shaped field.
///
/// Only the fixed key sets above are followed, and nesting beyond
/// [`MAX_URL_SEARCH_DEPTH`] is ignored.
pub fn find_url(value: &Value) -> Option<String> {
    find_url_at_depth(value, 0)
}

fn find_url_at_depth(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_URL_SEARCH_DEPTH {
        return None;
    }
    let object = value.as_object()?;

    for key in URL_KEYS {
        if let Some(url) = object.get(*key).and_then(Value::as_str)
            && !url.trim().is_empty()
        {
            return Some(url.trim().to_string());
        }
    }

    for key in CONTAINER_KEYS {
        if let Some(sub) = object.get(*key)
            && let Some(url) = find_url_at_depth(sub, depth + 1)
        {
            return Some(url);
        }
    }

    object
        .get(LIST_KEY)
        .and_then(Value::as_array)?
        .iter()
        .find_map(|item| find_url_at_depth(item, depth + 1))
}
