use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use genimg_contracts::GenError;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_S: u64 = 90;
/// Keeps the credential out of the URL, which reqwest echoes into errors.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// The network seam. One call is one blocking round-trip to
/// `models/{model}:{method}`; implementations never retry.
pub trait Transport: Send + Sync {
    fn post(&self, model: &str, method: &str, payload: &Value) -> Result<Value>;
}

pub struct HttpTransport {
    api_base: String,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_S),
            http: HttpClient::new(),
        }
    }

    /// Reads `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) and the optional
    /// `GEMINI_API_BASE` override.
    pub fn from_env() -> Result<Self, GenError> {
        let api_key = api_key_from_env().ok_or_else(|| {
            GenError::Configuration("GEMINI_API_KEY environment variable not set".to_string())
        })?;
        let mut transport = Self::new(api_key);
        if let Some(base) = non_empty_env("GEMINI_API_BASE") {
            transport = transport.with_api_base(base);
        }
        Ok(transport)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.api_base, model_path, method)
    }
}

impl Transport for HttpTransport {
    fn post(&self, model: &str, method: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint(model, method);
        tracing::debug!(%endpoint, "posting request");
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .timeout(self.timeout)
            .json(payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("request to {model} failed"))?;
        response_json_or_error(model, response)
    }
}

pub fn api_key_from_env() -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn response_json_or_error(model: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("{model} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{model} request failed ({}): {}",
            status.as_u16(),
            error_message_from_body(&body)
        );
    }
    serde_json::from_str(&body).with_context(|| format!("{model} returned invalid JSON payload"))
}

/// Prefers the service's `error.message` over the raw body.
fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), 512))
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use genimg_contracts::GenError;
    use serde_json::json;

    use super::{error_message_from_body, truncate_text, HttpTransport, Transport};

    #[test]
    fn endpoint_accepts_prefixed_and_bare_model_names() {
        let transport = HttpTransport::new("key").with_api_base("https://example.test/v1beta/");
        assert_eq!(
            transport.endpoint("gemini-2.5-flash-image", "generateContent"),
            "https://example.test/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        assert_eq!(
            transport.endpoint("models/imagen-4.0-generate-001", "predict"),
            "https://example.test/v1beta/models/imagen-4.0-generate-001:predict"
        );
    }

    #[test]
    fn service_error_message_is_extracted() {
        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted"}}"#;
        assert_eq!(error_message_from_body(body), "Resource has been exhausted");
        assert_eq!(error_message_from_body("  bad gateway "), "bad gateway");
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }

    #[test]
    fn connection_errors_never_carry_the_api_key() {
        let key = "SECRETKEY123";
        let transport = HttpTransport::new(key)
            .with_api_base("http://127.0.0.1:1/v1beta")
            .with_timeout(Duration::from_secs(5));
        let err = transport
            .post("gemini-2.5-flash-image", "generateContent", &json!({}))
            .unwrap_err();
        let GenError::Backend(detail) = GenError::from_backend_chain(&err) else {
            panic!("expected a backend error");
        };
        assert!(detail.starts_with("request to gemini-2.5-flash-image failed"));
        assert!(!detail.contains(key), "{detail}");
        assert!(!format!("{err:?}").contains(key));
    }
}
