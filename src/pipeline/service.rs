//! The remote text-to-image service.
//!
//! [`ImageService`] is the seam between the pipeline and the network: one
//! call turns a prompt into an image URL, another fetches the bytes behind
//! that URL. [`DeepAiService`] talks to DeepAI's `text2img` endpoint; tests
//! plug in scripted implementations instead.

use crate::config::GeneratorConfig;
use crate::error::{GeneratorError, ServiceError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Generates images from prompts and downloads the results.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Submit `prompt` and return the URL of the generated image.
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;

    /// Download the bytes behind `url`.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ServiceError>;
}

/// DeepAI `text2img` client.
///
/// Requests are `POST {api_url}` with an `api-key` header and a form body
/// `text=<prompt>`; a successful response is JSON carrying `output_url`.
pub struct DeepAiService {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for DeepAiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepAiService")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl DeepAiService {
    /// Build a client from the run configuration.
    ///
    /// Fails with [`GeneratorError::ApiKeyMissing`] when no usable key is set.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, GeneratorError> {
        let api_key = config.usable_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("pptx-illustrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GeneratorError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ImageService for DeepAiService {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        debug!("POST {} ({} chars)", self.api_url, prompt.len());
        let response = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .form(&[("text", prompt)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        parse_generate_response(status.as_u16(), &body)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }
}

/// Interpret a `text2img` response.
pub(crate) fn parse_generate_response(status: u16, body: &str) -> Result<String, ServiceError> {
    match status {
        200 => {
            let json: serde_json::Value = serde_json::from_str(body)
                .map_err(|e| ServiceError::InvalidResponse(format!("{e}: {}", truncate(body))))?;
            json.get("output_url")
                .and_then(|v| v.as_str())
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ServiceError::MissingOutputUrl(truncate(body)))
        }
        429 => Err(ServiceError::RateLimited),
        _ => Err(ServiceError::Status {
            status,
            body: truncate(body),
        }),
    }
}

/// Keep error bodies short enough for a log line.
fn truncate(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_yields_output_url() {
        let body = r#"{"id":"abc","output_url":"https://api.deepai.org/job-view-file/abc/outputs/output.jpg"}"#;
        assert_eq!(
            parse_generate_response(200, body).unwrap(),
            "https://api.deepai.org/job-view-file/abc/outputs/output.jpg"
        );
    }

    #[test]
    fn ok_without_output_url_is_an_error() {
        assert!(matches!(
            parse_generate_response(200, r#"{"err":"quota"}"#),
            Err(ServiceError::MissingOutputUrl(_))
        ));
        assert!(matches!(
            parse_generate_response(200, "<html>"),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn status_codes_map_to_errors() {
        assert!(matches!(
            parse_generate_response(429, "slow down"),
            Err(ServiceError::RateLimited)
        ));
        match parse_generate_response(401, "bad key") {
            Err(ServiceError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "é".repeat(500);
        let t = truncate(&body);
        assert_eq!(t.chars().count(), 201);
    }

    #[test]
    fn from_config_requires_key() {
        let config = GeneratorConfig::default();
        assert!(matches!(
            DeepAiService::from_config(&config),
            Err(GeneratorError::ApiKeyMissing)
        ));
        let config = GeneratorConfig::builder().api_key("secret").build().unwrap();
        let service = DeepAiService::from_config(&config).unwrap();
        assert!(!format!("{service:?}").contains("secret"));
    }
}
