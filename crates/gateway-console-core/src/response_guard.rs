//! Normalises backend error payloads and guards JSON decoding.

use async_trait::async_trait;
use serde_json::Value;

pub const DEFAULT_ERROR_TEXT_MAX_CHARS: usize = 200;
const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ResponseReadError {
    pub message: String,
}

impl ResponseReadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The parts of an HTTP response the guard inspects. The body is read at most once.
#[async_trait(?Send)]
pub trait GuardedResponse {
    fn status(&self) -> u16;
    fn content_type(&self) -> Result<Option<String>, ResponseReadError>;
    async fn text(&self) -> Result<String, ResponseReadError>;

    fn ok(&self) -> bool {
        (200..=299).contains(&self.status())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResponseGuardError {
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("Unexpected response from server: expected JSON but received {content_type}")]
    UnexpectedContentType { status: u16, content_type: String },
    #[error("Failed to read response body: {0}")]
    Read(#[from] ResponseReadError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseGuard {
    pub error_text_max_chars: usize,
}

impl Default for ResponseGuard {
    fn default() -> Self {
        Self {
            error_text_max_chars: DEFAULT_ERROR_TEXT_MAX_CHARS,
        }
    }
}

impl ResponseGuard {
    #[must_use]
    pub fn new(error_text_max_chars: usize) -> Self {
        Self {
            error_text_max_chars,
        }
    }

    /// Turns any error response into one human-readable message, falling
    /// back to `fallback` whenever the body carries nothing usable.
    pub async fn parse_error_response<R: GuardedResponse + ?Sized>(
        &self,
        response: &R,
        fallback: &str,
    ) -> String {
        let content_type = match response.content_type() {
            Ok(content_type) => content_type.unwrap_or_default().to_ascii_lowercase(),
            Err(error) => {
                tracing::debug!(error = %error, "could not inspect response headers");
                return fallback.to_string();
            }
        };
        let text = match response.text().await {
            Ok(text) => text,
            Err(error) => {
                tracing::debug!(error = %error, "could not read error response body");
                return fallback.to_string();
            }
        };

        if is_json_content_type(&content_type) {
            if let Ok(payload) = serde_json::from_str::<Value>(&text) {
                return message_from_json(&payload).unwrap_or_else(|| fallback.to_string());
            }
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return fallback.to_string();
        }
        if is_html_content_type(&content_type) || looks_like_html(trimmed) {
            return format!("{fallback} (server returned an HTML error page)");
        }
        truncate_chars(trimmed, self.error_text_max_chars)
    }

    /// Decodes a successful JSON response. Error statuses are normalised via
    /// [`Self::parse_error_response`]; a non-JSON success (e.g. a login page)
    /// is rejected instead of being parsed.
    pub async fn safe_parse_json_response<R: GuardedResponse + ?Sized>(
        &self,
        response: &R,
        fallback: &str,
    ) -> Result<Value, ResponseGuardError> {
        let status = response.status();
        if !response.ok() {
            let message = self.parse_error_response(response, fallback).await;
            return Err(ResponseGuardError::Http { status, message });
        }

        let content_type = response.content_type()?.unwrap_or_default();
        if !is_json_content_type(&content_type.to_ascii_lowercase()) {
            let content_type = if content_type.trim().is_empty() {
                "unknown content type".to_string()
            } else {
                content_type
            };
            return Err(ResponseGuardError::UnexpectedContentType {
                status,
                content_type,
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

pub async fn parse_error_response<R: GuardedResponse + ?Sized>(
    response: &R,
    fallback: &str,
) -> String {
    ResponseGuard::default()
        .parse_error_response(response, fallback)
        .await
}

pub async fn safe_parse_json_response<R: GuardedResponse + ?Sized>(
    response: &R,
    fallback: &str,
) -> Result<Value, ResponseGuardError> {
    ResponseGuard::default()
        .safe_parse_json_response(response, fallback)
        .await
}

fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    let media = media_type(content_type);
    media == "application/json" || media.ends_with("+json")
}

fn is_html_content_type(content_type: &str) -> bool {
    matches!(media_type(content_type), "text/html" | "application/xhtml+xml")
}

fn looks_like_html(trimmed: &str) -> bool {
    let head = trimmed
        .chars()
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn message_from_json(payload: &Value) -> Option<String> {
    match payload.get("detail") {
        Some(Value::Array(items)) => {
            // Joined only when every entry carries a `msg` string.
            let messages = items
                .iter()
                .map(|item| item.get("msg").and_then(Value::as_str))
                .collect::<Option<Vec<_>>>();
            if let Some(messages) = messages.filter(|messages| !messages.is_empty()) {
                return Some(messages.join("; "));
            }
        }
        Some(Value::String(detail)) => return Some(detail.clone()),
        _ => {}
    }
    payload
        .get("message")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubResponse {
        status: u16,
        content_type: Result<Option<String>, ResponseReadError>,
        body: Result<String, ResponseReadError>,
    }

    impl StubResponse {
        fn new(status: u16, content_type: &str, body: &str) -> Self {
            Self {
                status,
                content_type: Ok(Some(content_type.to_string())),
                body: Ok(body.to_string()),
            }
        }
    }

    #[async_trait(?Send)]
    impl GuardedResponse for StubResponse {
        fn status(&self) -> u16 {
            self.status
        }

        fn content_type(&self) -> Result<Option<String>, ResponseReadError> {
            self.content_type.clone()
        }

        async fn text(&self) -> Result<String, ResponseReadError> {
            self.body.clone()
        }
    }

    const FALLBACK: &str = "Failed to save gateway";

    #[tokio::test]
    async fn validation_detail_list_is_joined() {
        for status in [400, 422, 500] {
            let response = StubResponse::new(
                status,
                "application/json",
                r#"{"detail":[{"msg":"field required"},{"msg":"invalid type"}]}"#,
            );
            assert_eq!(
                parse_error_response(&response, FALLBACK).await,
                "field required; invalid type"
            );
        }
    }

    #[tokio::test]
    async fn detail_string_then_message_then_fallback() {
        let detail = StubResponse::new(409, "application/json; charset=utf-8", r#"{"detail":"Gateway name already exists"}"#);
        assert_eq!(
            parse_error_response(&detail, FALLBACK).await,
            "Gateway name already exists"
        );

        let message = StubResponse::new(500, "application/json", r#"{"message":"database unavailable"}"#);
        assert_eq!(
            parse_error_response(&message, FALLBACK).await,
            "database unavailable"
        );

        let other = StubResponse::new(500, "application/json", r#"{"error":{"code":42}}"#);
        assert_eq!(parse_error_response(&other, FALLBACK).await, FALLBACK);

        let empty_list = StubResponse::new(422, "application/json", r#"{"detail":[],"message":"bad"}"#);
        assert_eq!(parse_error_response(&empty_list, FALLBACK).await, "bad");
    }

    #[tokio::test]
    async fn partial_detail_list_is_not_joined() {
        let with_message = StubResponse::new(
            422,
            "application/json",
            r#"{"detail":[{"msg":"field required"},{"loc":["body"]}],"message":"top"}"#,
        );
        assert_eq!(parse_error_response(&with_message, FALLBACK).await, "top");

        let bare = StubResponse::new(422, "application/json", r#"{"detail":[{"msg":"field required"},"oops"]}"#);
        assert_eq!(parse_error_response(&bare, FALLBACK).await, FALLBACK);
    }

    #[tokio::test]
    async fn malformed_json_falls_back_to_text_handling() {
        let response = StubResponse::new(502, "application/json", "upstream timed out");
        assert_eq!(
            parse_error_response(&response, FALLBACK).await,
            "upstream timed out"
        );
    }

    #[tokio::test]
    async fn empty_or_unreadable_body_uses_fallback() {
        let empty = StubResponse::new(500, "text/plain", "   ");
        assert_eq!(parse_error_response(&empty, FALLBACK).await, FALLBACK);

        let unreadable = StubResponse {
            status: 500,
            content_type: Ok(Some("text/plain".to_string())),
            body: Err(ResponseReadError::new("stream already consumed")),
        };
        assert_eq!(parse_error_response(&unreadable, FALLBACK).await, FALLBACK);

        let broken_headers = StubResponse {
            status: 500,
            content_type: Err(ResponseReadError::new("headers unavailable")),
            body: Ok("ignored".to_string()),
        };
        assert_eq!(parse_error_response(&broken_headers, FALLBACK).await, FALLBACK);
    }

    #[tokio::test]
    async fn html_error_pages_are_named_as_such() {
        let by_header = StubResponse::new(502, "text/html; charset=utf-8", "<p>Bad gateway</p>");
        let by_marker = StubResponse::new(502, "", "  <!DOCTYPE html><html><body>nginx</body></html>");
        for response in [by_header, by_marker] {
            let message = parse_error_response(&response, FALLBACK).await;
            assert!(message.starts_with(FALLBACK));
            assert!(message.contains("HTML error page"));
        }
    }

    #[tokio::test]
    async fn long_plain_text_is_truncated() {
        let body = "é".repeat(250);
        let response = StubResponse::new(500, "text/plain", &body);
        let message = parse_error_response(&response, FALLBACK).await;
        assert_eq!(message.chars().count(), 203);
        assert!(message.ends_with("..."));

        let short_limit = ResponseGuard::new(5);
        let message = short_limit
            .parse_error_response(&StubResponse::new(500, "text/plain", "abcdefgh"), FALLBACK)
            .await;
        assert_eq!(message, "abcde...");
    }

    #[tokio::test]
    async fn json_success_is_decoded() {
        let response = StubResponse::new(200, "application/json", r#"{"id":"gw-1","enabled":true}"#);
        let value = safe_parse_json_response(&response, FALLBACK)
            .await
            .expect("json body");
        assert_eq!(value["id"], "gw-1");
    }

    #[tokio::test]
    async fn error_status_rejects_with_normalised_message() {
        let response = StubResponse::new(422, "application/json", r#"{"detail":[{"msg":"field required"}]}"#);
        let error = safe_parse_json_response(&response, FALLBACK)
            .await
            .expect_err("422");
        assert!(matches!(error, ResponseGuardError::Http { status: 422, .. }));
        assert_eq!(error.to_string(), "field required");
    }

    #[tokio::test]
    async fn html_success_is_unexpected() {
        let response = StubResponse::new(200, "text/html", "<!doctype html><title>Login</title>");
        let error = safe_parse_json_response(&response, FALLBACK)
            .await
            .expect_err("login page");
        assert!(matches!(
            error,
            ResponseGuardError::UnexpectedContentType { status: 200, .. }
        ));
        assert!(error.to_string().contains("text/html"));

        let missing = StubResponse {
            status: 204,
            content_type: Ok(None),
            body: Ok(String::new()),
        };
        let error = safe_parse_json_response(&missing, FALLBACK)
            .await
            .expect_err("no content type");
        assert!(error.to_string().contains("unknown content type"));
    }

    #[tokio::test]
    async fn json_syntax_error_propagates() {
        let response = StubResponse::new(200, "application/json", "{not json");
        let error = safe_parse_json_response(&response, FALLBACK)
            .await
            .expect_err("syntax error");
        assert!(matches!(error, ResponseGuardError::Json(_)));
    }

    #[test]
    fn json_content_types() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(!is_json_content_type("text/html"));
        assert!(!is_json_content_type(""));
    }
}
