//! Error types for ad generation.

use std::time::Duration;

/// Maximum length of an API error body carried in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Errors that can occur while generating an ad campaign.
#[derive(Debug, thiserror::Error)]
pub enum AdCraftError {
    /// API key missing, empty, or the key provider could not be reached.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The uploaded product image could not be read or is unusable.
    #[error("invalid input image: {0}")]
    Input(String),

    /// The concept stage failed; there is nothing to fan out.
    #[error("concept generation failed: {0}")]
    Generation(String),

    /// Every image attempt in the fan-out failed.
    #[error("all {attempts} image generation attempts failed")]
    AllAttemptsFailed {
        /// Number of ideas an image was attempted for.
        attempts: usize,
    },

    /// API key rejected by the service.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body, with keys redacted.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Delay requested by the `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The service answered with something we could not interpret.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A single request exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., reading the upload or saving an image).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Language used for user-facing error messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    /// Arabic, the product's primary audience.
    #[default]
    Arabic,
    /// English.
    English,
}

impl AdCraftError {
    /// Returns true for the errors `AdGenerator::run` lets escape to the caller.
    ///
    /// Transport-level variants only reach callers that use the backend
    /// directly; the generator wraps them into [`AdCraftError::Generation`].
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Input(_)
                | Self::Generation(_)
                | Self::AllAttemptsFailed { .. }
        )
    }

    /// Returns a human-readable message suitable for showing to an end user.
    pub fn user_message(&self, locale: Locale) -> String {
        match (self, locale) {
            (Self::Configuration(_), Locale::Arabic) => {
                "لا يمكن تهيئة خدمة الذكاء الاصطناعي. يرجى التأكد من أن مفتاح API الخاص بك قد تم إعداده بشكل صحيح.".into()
            }
            (Self::Configuration(_), Locale::English) => {
                "The AI service could not be initialised. Please make sure your API key is configured correctly.".into()
            }
            (Self::Input(_), Locale::Arabic) => {
                "تعذرت قراءة صورة المنتج. يرجى رفع صورة بصيغة PNG أو JPEG أو WEBP.".into()
            }
            (Self::Input(_), Locale::English) => {
                "The product image could not be read. Please upload a PNG, JPEG or WEBP image.".into()
            }
            (Self::Generation(_), Locale::Arabic) => {
                "تعذر توليد الأفكار الإعلانية لهذا المنتج. يرجى المحاولة مرة أخرى.".into()
            }
            (Self::Generation(_), Locale::English) => {
                "Ad concepts could not be generated for this product. Please try again.".into()
            }
            (Self::AllAttemptsFailed { .. }, Locale::Arabic) => {
                "فشلت جميع محاولات توليد الصور الإعلانية. يرجى تجربة صورة أخرى.".into()
            }
            (Self::AllAttemptsFailed { .. }, Locale::English) => {
                "All image generation attempts failed. Please try another image.".into()
            }
            (_, Locale::Arabic) => "حدث خطأ غير متوقع. يرجى المحاولة مرة أخرى.".into(),
            (_, Locale::English) => "An unexpected error occurred. Please try again.".into(),
        }
    }
}

/// Result type alias for ad generation operations.
pub type Result<T> = std::result::Result<T, AdCraftError>;

/// Parses a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Redacts Google API keys and truncates an error body for display.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_ERROR_BODY_CHARS + 3));
    let mut rest = text;

    while let Some(pos) = rest.find("AIza") {
        out.push_str(&rest[..pos]);
        let key_len = rest[pos..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len() - pos);
        out.push_str("[REDACTED]");
        rest = &rest[pos + key_len..];
    }
    out.push_str(rest);

    let trimmed = out.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
