//! Concept stage: product photo in, structured campaign ideas out.

use crate::encoder::EncodedImage;
use crate::error::{AdCraftError, Locale, Result};
use crate::gemini::{
    ConceptModel, GenerateContentRequest, GenerativeBackend, GenerationConfig, Part,
};
use crate::types::AdIdea;
use serde::Deserialize;
use serde_json::{json, Value};

/// Asks the text model for a fixed number of distinct ad concepts.
#[derive(Debug, Clone)]
pub struct ConceptGenerator {
    model: ConceptModel,
    idea_count: usize,
    locale: Locale,
}

#[derive(Debug, Deserialize)]
struct ConceptsPayload {
    ideas: Vec<AdIdea>,
}

impl ConceptGenerator {
    /// Creates a generator requesting `idea_count` ideas written in `locale`.
    pub fn new(model: ConceptModel, idea_count: usize, locale: Locale) -> Self {
        Self {
            model,
            idea_count,
            locale,
        }
    }

    /// Number of ideas requested from the model.
    pub fn idea_count(&self) -> usize {
        self.idea_count
    }

    /// Builds the `generateContent` request for `image`.
    pub fn build_request(&self, image: &EncodedImage) -> GenerateContentRequest {
        GenerateContentRequest::new(
            vec![Part::image(image), Part::text(self.instruction())],
            GenerationConfig::json(response_schema(self.idea_count)),
        )
    }

    /// Runs the concept stage. All-or-nothing: any failure is fatal.
    ///
    /// The model may return fewer ideas than requested; any positive count
    /// is accepted, extra ideas are dropped, and zero ideas is an error.
    pub async fn generate<B>(&self, backend: &B, image: &EncodedImage) -> Result<Vec<AdIdea>>
    where
        B: GenerativeBackend + ?Sized,
    {
        let request = self.build_request(image);
        tracing::debug!(
            model = self.model.as_str(),
            ideas = self.idea_count,
            "requesting ad concepts"
        );

        let response = backend
            .generate_content(self.model.as_str(), &request)
            .await
            .map_err(|e| AdCraftError::Generation(e.to_string()))?;

        if let Some(reason) = response.block_reason() {
            return Err(AdCraftError::Generation(reason));
        }

        let text = response.text().ok_or_else(|| {
            let finish = response
                .first_candidate()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "no candidates".into());
            AdCraftError::Generation(format!("empty concept response ({finish})"))
        })?;

        let ideas = parse_ideas(&text, self.idea_count)?;
        tracing::info!(count = ideas.len(), "generated ad concepts");
        Ok(ideas)
    }

    fn instruction(&self) -> String {
        let n = self.idea_count;
        match self.locale {
            Locale::Arabic => format!(
                "بصفتك مدير إبداعي خبير، قم بتحليل صورة المنتج هذه واقتراح {n} أفكار إعلانية مبتكرة وفريدة من نوعها.\n\
                 يجب أن تكون كل فكرة مختلفة تمامًا عن الأخرى، وتغطي سيناريوهات متنوعة (مثل الفخامة، الاستخدام اليومي، الفن التجريدي، الطبيعة، إلخ).\n\
                 لكل فكرة قدّم: عنوانًا قصيرًا (title)، ونصًا إعلانيًا جذابًا باللغة العربية (description)، \
                 ونصًا توجيهيًا باللغة الإنجليزية لتوليد صورة (imagePrompt).\n\
                 يجب أن يصف imagePrompt المشهد البصري فقط، مع إبقاء المنتج الظاهر في الصورة كما هو، \
                 ودون أي نصوص أو شعارات أو كتابة داخل الصورة."
            ),
            Locale::English => format!(
                "As an expert creative director, analyse this product photo and propose {n} innovative, unique advertising concepts.\n\
                 Every concept must be completely different from the others and cover varied scenarios \
                 (luxury, everyday use, abstract art, nature, and so on).\n\
                 For each concept give a short title, persuasive ad copy (description), and an image-generation prompt (imagePrompt).\n\
                 The imagePrompt must describe the visual scene only, keep the product from the photo unchanged, \
                 and must not ask for any text, logos or lettering in the image."
            ),
        }
    }
}

/// Structured-output schema: `{ideas: [{title, description, imagePrompt}]}`, all required.
pub fn response_schema(idea_count: usize) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "ideas": {
                "type": "ARRAY",
                "description": format!("Exactly {idea_count} distinct advertising concepts."),
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "imagePrompt": { "type": "STRING" }
                    },
                    "required": ["title", "description", "imagePrompt"],
                    "propertyOrdering": ["title", "description", "imagePrompt"]
                }
            }
        },
        "required": ["ideas"]
    })
}

fn parse_ideas(text: &str, limit: usize) -> Result<Vec<AdIdea>> {
    let payload: ConceptsPayload = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AdCraftError::Generation(format!("malformed concept JSON: {e}")))?;

    let mut ideas = payload.ideas;
    if ideas.is_empty() {
        return Err(AdCraftError::Generation("model returned no ideas".into()));
    }
    if let Some(pos) = ideas.iter().position(|idea| {
        idea.title.trim().is_empty()
            || idea.description.trim().is_empty()
            || idea.image_prompt.trim().is_empty()
    }) {
        return Err(AdCraftError::Generation(format!(
            "idea {} has an empty field",
            pos + 1
        )));
    }

    if ideas.len() > limit {
        tracing::debug!(returned = ideas.len(), limit, "dropping surplus ideas");
        ideas.truncate(limit);
    }
    Ok(ideas)
}

/// Models occasionally wrap JSON in a Markdown fence despite the MIME type.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
