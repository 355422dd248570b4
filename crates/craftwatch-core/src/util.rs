//! Small text helpers shared by the models, config and HTTP clients.

use reqwest::StatusCode;
use serde::Deserialize;

/// Longest slice of a raw response body quoted in an error message.
const MAX_BODY_EXCERPT: usize = 180;

/// Trimmed text, or `None` when absent or blank.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// Error payload shapes returned by GoTrue (`error_description`, `msg`) and
/// PostgREST (`message`).
#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl BackendErrorBody {
    fn into_message(self) -> Option<String> {
        [self.message, self.msg, self.error_description, self.error]
            .into_iter()
            .find_map(normalize_text_option)
    }
}

/// Render a failed backend response as `message (status)`.
pub fn parse_api_error(status: StatusCode, body: &str) -> String {
    let code = status.as_u16();
    let message = serde_json::from_str::<BackendErrorBody>(body)
        .ok()
        .and_then(BackendErrorBody::into_message)
        .unwrap_or_else(|| body.trim().chars().take(MAX_BODY_EXCERPT).collect());

    if message.is_empty() {
        format!("HTTP {code}")
    } else {
        format!("{message} ({code})")
    }
}
