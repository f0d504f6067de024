//! Image stage: one independent image attempt per idea.

use crate::encoder::{EncodedImage, ImageFormat};
use crate::gemini::{
    GenerateContentRequest, GenerateContentResponse, GenerativeBackend, GenerationConfig,
    ImageModel, Part,
};
use crate::types::{AdIdea, AdImage};
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Default deadline for a single image attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// A failed image attempt. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("image for idea {} failed: {reason}", .index + 1)]
pub struct ImageAttemptFailure {
    /// Position of the idea in the concept list.
    pub index: usize,
    /// The image prompt that was attempted.
    pub prompt: String,
    /// What went wrong.
    pub reason: String,
}

/// Outcome of one idea's attempt.
pub type ImageAttempt = std::result::Result<AdImage, ImageAttemptFailure>;

/// Launches all image attempts together and waits for every one to settle.
#[derive(Debug, Clone)]
pub struct ImageFanOut {
    model: ImageModel,
    attempt_timeout: Duration,
}

impl ImageFanOut {
    /// Creates a fan-out using `model`, giving each attempt `attempt_timeout`.
    pub fn new(model: ImageModel, attempt_timeout: Duration) -> Self {
        Self {
            model,
            attempt_timeout,
        }
    }

    /// Builds the request for one idea: the original photo plus the scene prompt.
    pub fn build_request(image: &EncodedImage, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest::new(
            vec![Part::image(image), Part::text(prompt)],
            GenerationConfig::image(),
        )
    }

    /// Runs one attempt per idea concurrently.
    ///
    /// The returned vector has the same length and order as `ideas`. A failed,
    /// timed-out or panicked attempt yields an [`ImageAttemptFailure`] in its
    /// slot and never affects the other attempts. No retries.
    pub async fn generate<B>(
        &self,
        backend: Arc<B>,
        image: Arc<EncodedImage>,
        ideas: &[AdIdea],
    ) -> Vec<ImageAttempt>
    where
        B: GenerativeBackend + ?Sized + 'static,
    {
        let timeout = self.attempt_timeout;
        // Dropping the set aborts attempts still in flight.
        let mut tasks = JoinSet::new();
        for (index, idea) in ideas.iter().enumerate() {
            let backend = Arc::clone(&backend);
            let image = Arc::clone(&image);
            let model = self.model.as_str().to_string();
            let prompt = idea.image_prompt.clone();

            tasks.spawn(async move {
                tracing::debug!(index, prompt = %prompt, "generating ad image");
                let outcome = match tokio::time::timeout(
                    timeout,
                    attempt(backend.as_ref(), &model, &image, &prompt, index),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(format!("timed out after {}s", timeout.as_secs())),
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<std::result::Result<AdImage, String>>> =
            ideas.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => tracing::warn!("image task failed: {e}"),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| Err("task failed before completing".into()))
                    .map_err(|reason| {
                        let failure = ImageAttemptFailure {
                            index,
                            prompt: ideas[index].image_prompt.clone(),
                            reason,
                        };
                        tracing::warn!(index, "{failure}");
                        failure
                    })
            })
            .collect()
    }
}

async fn attempt<B>(
    backend: &B,
    model: &str,
    image: &EncodedImage,
    prompt: &str,
    index: usize,
) -> std::result::Result<AdImage, String>
where
    B: GenerativeBackend + ?Sized,
{
    let request = ImageFanOut::build_request(image, prompt);
    let response = backend
        .generate_content(model, &request)
        .await
        .map_err(|e| e.to_string())?;

    extract_image(&response, prompt, index)
}

fn extract_image(
    response: &GenerateContentResponse,
    prompt: &str,
    index: usize,
) -> std::result::Result<AdImage, String> {
    if let Some(reason) = response.block_reason() {
        return Err(reason);
    }
    let candidate = response
        .first_candidate()
        .ok_or_else(|| "no candidates in response".to_string())?;

    let Some(inline) = response.first_inline_data() else {
        let finish = candidate.finish_reason.as_deref().unwrap_or("unknown");
        let blocked = candidate.blocked_categories();
        tracing::warn!(
            index,
            finish_reason = finish,
            blocked = blocked.as_deref().unwrap_or("none"),
            "no image data in response"
        );
        return Err(format!("no image data (finish reason: {finish})"));
    };

    let bytes = decode_base64(&inline.data)
        .map_err(|e| format!("invalid base64 image data: {e}"))?;
    if bytes.is_empty() {
        return Err("empty image data".into());
    }

    let mime_type = if inline.mime_type.is_empty() {
        ImageFormat::from_magic_bytes(&bytes)
            .map(|f| f.mime_type())
            .unwrap_or("image/png")
    } else {
        inline.mime_type.as_str()
    };

    let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(AdImage::new(mime_type, &data, prompt, index))
}

/// Decodes padded or unpadded standard base64, ignoring embedded whitespace.
fn decode_base64(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let cleaned: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    // Some responses drop the trailing `=` padding
    base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned)
}
