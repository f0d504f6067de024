//! Campaign data model.

use crate::encoder::ImageFormat;
use crate::error::{AdCraftError, Result};
use crate::fanout::ImageAttemptFailure;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// One advertising concept proposed by the concept model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdIdea {
    /// Short campaign title.
    pub title: String,
    /// Ad copy shown next to the image.
    pub description: String,
    /// Visual scene description fed to the image model. Never asks for text or logos.
    pub image_prompt: String,
}

/// A generated advertising image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdImage {
    /// `data:<mime>;base64,<bytes>` URL of the image.
    pub src: String,
    /// The image prompt of the idea that produced this image.
    pub prompt: String,
    /// Position of the originating idea in [`AdCampaign::ideas`].
    pub idea_index: usize,
}

impl AdImage {
    pub(crate) fn new(mime_type: &str, base64_data: &str, prompt: &str, idea_index: usize) -> Self {
        Self {
            src: format!("data:{mime_type};base64,{base64_data}"),
            prompt: prompt.to_string(),
            idea_index,
        }
    }

    /// Returns the MIME type embedded in the data URL.
    pub fn mime_type(&self) -> &str {
        self.src
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or_default()
    }

    /// Returns the image format, if it is one we know how to save.
    pub fn format(&self) -> Option<ImageFormat> {
        ImageFormat::from_mime_type(self.mime_type())
    }

    /// Decodes the data URL back to the raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let (_, payload) = self
            .src
            .split_once(";base64,")
            .ok_or_else(|| AdCraftError::Decode("not a base64 data URL".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| AdCraftError::Decode(e.to_string()))
    }

    /// Suggested file name, e.g. `ad-1-golden_hour_on_a_marble.png`.
    pub fn file_name(&self) -> String {
        let slug: String = self
            .prompt
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .take(24)
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();
        let ext = self.format().map(|f| f.extension()).unwrap_or("png");

        if slug.is_empty() {
            format!("ad-{}.{}", self.idea_index + 1, ext)
        } else {
            format!("ad-{}-{}.{}", self.idea_index + 1, slug, ext)
        }
    }
}

/// Whether every idea produced an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    /// One image per idea.
    Complete,
    /// At least one idea has no image.
    Partial,
}

/// The result of a successful generation run.
#[derive(Debug, Clone, Serialize)]
pub struct AdCampaign {
    /// Successful images, in the order of the ideas that produced them. Never empty.
    pub images: Vec<AdImage>,
    /// Every idea from the concept stage, including those whose image failed.
    pub ideas: Vec<AdIdea>,
    /// Ideas whose image attempt failed.
    pub failures: Vec<ImageAttemptFailure>,
}

impl AdCampaign {
    /// Returns [`CampaignStatus::Partial`] if any image attempt failed.
    pub fn status(&self) -> CampaignStatus {
        if self.images.len() == self.ideas.len() {
            CampaignStatus::Complete
        } else {
            CampaignStatus::Partial
        }
    }

    /// Returns the image generated for the idea at `idea_index`, if any.
    pub fn image_for(&self, idea_index: usize) -> Option<&AdImage> {
        self.images.iter().find(|img| img.idea_index == idea_index)
    }
}
