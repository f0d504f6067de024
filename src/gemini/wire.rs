//! `generateContent` request and response bodies.

use crate::encoder::EncodedImage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a `models/{model}:generateContent` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns; this crate always sends exactly one.
    pub contents: Vec<Content>,
    /// Output configuration.
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// Builds a single-turn request from the given parts.
    pub fn new(parts: Vec<Part>, generation_config: GenerationConfig) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config,
        }
    }

    /// Returns all parts of the (single) turn.
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.contents.iter().flat_map(|c| c.parts.iter())
    }

    /// Returns the concatenated text parts.
    pub fn prompt_text(&self) -> String {
        self.parts()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One turn of a request.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    /// Ordered parts of the turn.
    pub parts: Vec<Part>,
}

/// A part in a request - can be text or inline image data.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    /// Plain text instruction.
    Text {
        /// The text.
        text: String,
    },
    /// Base64 media payload.
    InlineData {
        /// The payload.
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an inline image part from an encoded upload.
    pub fn image(image: &EncodedImage) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            },
        }
    }
}

/// Base64 media embedded in a request or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type of the payload.
    pub mime_type: String,
    /// Standard base64 payload.
    pub data: String,
}

/// `generationConfig` block.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Requested output modalities, e.g. `["IMAGE"]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    /// Requested output MIME type, e.g. `application/json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// OpenAPI-style schema the JSON output must follow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

impl GenerationConfig {
    /// Config for structured JSON output following `schema`.
    pub fn json(schema: Value) -> Self {
        Self {
            response_modalities: None,
            response_mime_type: Some("application/json".into()),
            response_schema: Some(schema),
        }
    }

    /// Config for image-only output.
    pub fn image() -> Self {
        Self {
            response_modalities: Some(vec!["IMAGE".into()]),
            response_mime_type: None,
            response_schema: None,
        }
    }
}

/// Response of a `generateContent` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate answers; may be empty when the prompt was blocked.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Present when the prompt itself was rejected.
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

/// A single candidate answer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated content; absent when generation was stopped early.
    #[serde(default)]
    pub content: Option<CandidateContent>,
    /// Why generation stopped (`STOP`, `SAFETY`, `IMAGE_SAFETY`, ...).
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Per-category safety assessment.
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

/// Content of a candidate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    /// Parts of the answer.
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

/// A part of a candidate's content.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    /// Text output.
    #[serde(default)]
    pub text: Option<String>,
    /// Media output.
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

/// Prompt-level block information.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Block reason, e.g. `SAFETY`.
    #[serde(default)]
    pub block_reason: Option<String>,
    /// Human-readable explanation of the block.
    #[serde(default)]
    pub block_reason_message: Option<String>,
}

/// Safety rating for one harm category.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    /// Harm category, e.g. `HARM_CATEGORY_DANGEROUS_CONTENT`.
    #[serde(default)]
    pub category: String,
    /// Probability bucket, e.g. `NEGLIGIBLE`.
    #[serde(default)]
    pub probability: String,
    /// Whether this category caused a block.
    #[serde(default)]
    pub blocked: bool,
}

impl GenerateContentResponse {
    /// Returns the prompt block reason, if the prompt was rejected.
    pub fn block_reason(&self) -> Option<String> {
        let feedback = self.prompt_feedback.as_ref()?;
        let reason = feedback.block_reason.as_ref()?;
        Some(
            feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("prompt blocked: {reason}")),
        )
    }

    /// Returns the first candidate.
    pub fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let parts = &self.first_candidate()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// First inline media part of the first candidate.
    pub fn first_inline_data(&self) -> Option<&InlineData> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref())
    }
}

impl Candidate {
    /// Safety categories that were flagged as blocked, joined for logging.
    pub fn blocked_categories(&self) -> Option<String> {
        let blocked: Vec<&str> = self
            .safety_ratings
            .iter()
            .filter(|r| r.blocked)
            .map(|r| r.category.as_str())
            .collect();
        if blocked.is_empty() {
            None
        } else {
            Some(blocked.join(","))
        }
    }
}
