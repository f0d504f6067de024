//! Generative AI service boundary.

mod client;
pub mod wire;

pub use client::{GeminiClient, DEFAULT_BASE_URL};
pub use wire::{GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};

use crate::error::Result;
use async_trait::async_trait;

/// Transport to a `generateContent`-style API.
///
/// Implemented by [`GeminiClient`]; tests substitute in-memory fakes.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Sends one request to `model` and returns the parsed response.
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;
}

/// Text model used for the concept stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConceptModel {
    /// Gemini 2.5 Flash.
    #[default]
    Flash,
    /// Gemini 2.5 Pro.
    Pro,
    /// Any other model identifier.
    Custom(String),
}

impl ConceptModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Flash => "gemini-2.5-flash",
            Self::Pro => "gemini-2.5-pro",
            Self::Custom(name) => name,
        }
    }
}

/// Image model used for the fan-out stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
    /// Any other model identifier.
    Custom(String),
}

impl ImageModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
            Self::Custom(name) => name,
        }
    }
}
