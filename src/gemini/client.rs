//! reqwest-backed Gemini client.

use crate::error::{parse_retry_after, sanitize_error_message, AdCraftError, Result};
use crate::gemini::wire::{GenerateContentRequest, GenerateContentResponse};
use crate::gemini::GenerativeBackend;
use async_trait::async_trait;
use std::time::Instant;

/// Default Generative Language API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini REST client bound to one API key.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom API root (proxies, tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the API root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> AdCraftError {
        let text = sanitize_error_message(text);
        if status == 404 {
            return AdCraftError::Api {
                status,
                message: "Model not found. Verify the model name is correct.".into(),
            };
        }
        if status == 429 {
            let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
            return AdCraftError::RateLimited { retry_after };
        }
        if status == 401 || status == 403 {
            return AdCraftError::Auth(text);
        }
        let lower = text.to_lowercase();
        if lower.contains("api key not valid") || lower.contains("api_key_invalid") {
            return AdCraftError::Auth(text);
        }
        if lower.contains("safety")
            || lower.contains("blocked")
            || lower.contains("prohibited")
        {
            return AdCraftError::ContentBlocked(text);
        }
        AdCraftError::Api {
            status,
            message: text,
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let start = Instant::now();

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let body = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            AdCraftError::UnexpectedResponse(format!(
                "cannot parse generateContent response: {e}"
            ))
        })?;

        tracing::debug!(
            model,
            candidates = parsed.candidates.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generateContent completed"
        );

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new("test-key")
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client().endpoint("gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );

        let proxied = GeminiClient::with_base_url("k", "http://localhost:8080/v1beta/");
        assert_eq!(
            proxied.endpoint("m"),
            "http://localhost:8080/v1beta/models/m:generateContent"
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let rendered = format!("{:?}", GeminiClient::new("AIzaSecret"));
        assert!(!rendered.contains("AIzaSecret"));
    }

    #[test]
    fn test_parse_error_mapping() {
        let headers = reqwest::header::HeaderMap::new();
        let c = client();

        assert!(matches!(
            c.parse_error(403, "forbidden", &headers),
            AdCraftError::Auth(_)
        ));
        assert!(matches!(
            c.parse_error(400, "API key not valid. Please pass a valid API key.", &headers),
            AdCraftError::Auth(_)
        ));
        assert!(matches!(
            c.parse_error(400, "Request blocked by safety settings", &headers),
            AdCraftError::ContentBlocked(_)
        ));
        assert!(matches!(
            c.parse_error(404, "", &headers),
            AdCraftError::Api { status: 404, .. }
        ));
        assert!(matches!(
            c.parse_error(500, "internal", &headers),
            AdCraftError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_parse_error_rate_limited() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        match client().parse_error(429, "quota", &headers) {
            AdCraftError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(12)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }
}
