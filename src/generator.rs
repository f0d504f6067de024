//! End-to-end campaign generation.
//!
//! `AdGenerator` encodes the upload once, asks the text model for campaign
//! ideas, then fans out one image request per idea. The concept stage is
//! all-or-nothing; the image stage is best-effort and only fails when every
//! attempt fails.

use crate::client::ClientFactory;
use crate::concepts::ConceptGenerator;
use crate::encoder::EncodedImage;
use crate::error::{AdCraftError, Locale, Result};
use crate::fanout::{ImageFanOut, DEFAULT_ATTEMPT_TIMEOUT};
use crate::gemini::{ConceptModel, GeminiClient, GenerativeBackend, ImageModel};
use crate::key::{EnvKeyProvider, KeyProvider, StaticKeyProvider};
use crate::types::AdCampaign;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Ideas requested when not configured otherwise.
pub const DEFAULT_IDEA_COUNT: usize = 6;
/// Upper bound on ideas per run (hard limit).
pub const MAX_IDEA_COUNT: usize = 10;

/// Progress of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing started yet.
    Idle,
    /// Reading and encoding the upload.
    Encoding,
    /// Waiting for campaign ideas.
    ConceptsPending,
    /// Waiting for the image fan-out to settle.
    ImagesPending,
    /// Every idea produced an image.
    Success,
    /// Some ideas produced an image.
    PartialSuccess,
    /// The run ended with an error.
    Failed,
}

/// The product photo to build a campaign from.
#[derive(Debug, Clone)]
pub enum Upload {
    /// An image file on disk.
    Path(PathBuf),
    /// Raw bytes with their declared MIME type.
    Bytes {
        /// File contents.
        bytes: Vec<u8>,
        /// Declared MIME type, e.g. `image/jpeg`.
        mime_type: String,
    },
    /// An image that is already encoded.
    Encoded(EncodedImage),
}

/// Builder for [`AdGenerator`].
#[derive(Default)]
pub struct AdGeneratorBuilder {
    api_key: Option<String>,
    key_provider: Option<Arc<dyn KeyProvider>>,
    base_url: Option<String>,
    concept_model: ConceptModel,
    image_model: ImageModel,
    idea_count: Option<usize>,
    attempt_timeout: Option<Duration>,
    locale: Locale,
}

impl AdGeneratorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GEMINI_API_KEY`, `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Uses a custom key source. Ignored when an explicit key is set.
    pub fn key_provider(mut self, provider: impl KeyProvider + 'static) -> Self {
        self.key_provider = Some(Arc::new(provider));
        self
    }

    /// Overrides the API root (proxies, local mocks).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the text model used for concepts.
    pub fn concept_model(mut self, model: ConceptModel) -> Self {
        self.concept_model = model;
        self
    }

    /// Sets the image model used for the fan-out.
    pub fn image_model(mut self, model: ImageModel) -> Self {
        self.image_model = model;
        self
    }

    /// Sets how many ideas to request (clamped to `1..=MAX_IDEA_COUNT`).
    pub fn idea_count(mut self, count: usize) -> Self {
        self.idea_count = Some(count);
        self
    }

    /// Sets the deadline for each image attempt.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Sets the language of the generated ad copy and of user-facing errors.
    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Builds a generator backed by Gemini. The key is fetched on first use.
    pub fn build(self) -> Result<AdGenerator<GeminiClient>> {
        let keys: Arc<dyn KeyProvider> = match (self.api_key.clone(), self.key_provider.clone()) {
            (Some(key), _) => Arc::new(StaticKeyProvider::new(key)),
            (None, Some(provider)) => provider,
            (None, None) => Arc::new(EnvKeyProvider::new()),
        };
        let clients = match self.base_url.clone() {
            Some(url) => ClientFactory::gemini_with_base_url(keys, url),
            None => ClientFactory::gemini(keys),
        };
        Ok(self.build_with(Arc::new(clients)))
    }

    /// Builds a generator around an existing client factory.
    pub fn build_with<B>(self, clients: Arc<ClientFactory<B>>) -> AdGenerator<B> {
        let idea_count = self
            .idea_count
            .unwrap_or(DEFAULT_IDEA_COUNT)
            .clamp(1, MAX_IDEA_COUNT);
        let timeout = self.attempt_timeout.unwrap_or(DEFAULT_ATTEMPT_TIMEOUT);

        AdGenerator {
            clients,
            concepts: ConceptGenerator::new(self.concept_model, idea_count, self.locale),
            images: ImageFanOut::new(self.image_model, timeout),
            locale: self.locale,
        }
    }
}

/// Generates an ad campaign from a product photo.
pub struct AdGenerator<B = GeminiClient> {
    clients: Arc<ClientFactory<B>>,
    concepts: ConceptGenerator,
    images: ImageFanOut,
    locale: Locale,
}

impl AdGenerator<GeminiClient> {
    /// Creates a new `AdGeneratorBuilder`.
    pub fn builder() -> AdGeneratorBuilder {
        AdGeneratorBuilder::new()
    }
}

impl<B> AdGenerator<B>
where
    B: GenerativeBackend + 'static,
{
    /// Locale used for ad copy and error messages.
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Number of ideas requested per run.
    pub fn idea_count(&self) -> usize {
        self.concepts.idea_count()
    }

    /// Runs the pipeline on an already encoded image.
    pub async fn run(&self, image: EncodedImage) -> Result<AdCampaign> {
        self.run_with_progress(Upload::Encoded(image), |_| {}).await
    }

    /// Runs the pipeline on raw upload bytes.
    pub async fn run_bytes(&self, bytes: Vec<u8>, mime_type: &str) -> Result<AdCampaign> {
        let upload = Upload::Bytes {
            bytes,
            mime_type: mime_type.to_string(),
        };
        self.run_with_progress(upload, |_| {}).await
    }

    /// Runs the pipeline on an image file.
    pub async fn run_path(&self, path: impl Into<PathBuf>) -> Result<AdCampaign> {
        self.run_with_progress(Upload::Path(path.into()), |_| {})
            .await
    }

    /// Runs the pipeline, reporting each stage transition to `progress`.
    pub async fn run_with_progress<F>(&self, upload: Upload, progress: F) -> Result<AdCampaign>
    where
        F: Fn(Stage) + Send + Sync,
    {
        let enter = |stage: Stage| {
            tracing::info!(?stage, "ad generation stage");
            progress(stage);
        };

        enter(Stage::Idle);
        let result = self.execute(upload, &enter).await;
        match &result {
            Ok(campaign) if campaign.failures.is_empty() => enter(Stage::Success),
            Ok(_) => enter(Stage::PartialSuccess),
            Err(e) => {
                tracing::error!("ad generation failed: {e}");
                enter(Stage::Failed);
            }
        }
        result
    }

    async fn execute(&self, upload: Upload, enter: &(dyn Fn(Stage) + Send + Sync)) -> Result<AdCampaign> {
        enter(Stage::Encoding);
        let image = Arc::new(match upload {
            Upload::Path(path) => EncodedImage::from_path(path).await?,
            Upload::Bytes { bytes, mime_type } => EncodedImage::from_bytes(&bytes, &mime_type)?,
            Upload::Encoded(image) => image,
        });

        enter(Stage::ConceptsPending);
        let client = self.clients.get().await?;
        let ideas = self.concepts.generate(client.as_ref(), &image).await?;
        if ideas.is_empty() {
            return Err(AdCraftError::Generation("model returned no ideas".into()));
        }

        enter(Stage::ImagesPending);
        let attempts = self.images.generate(client, image, &ideas).await;

        let mut images = Vec::with_capacity(attempts.len());
        let mut failures = Vec::new();
        for attempt in attempts {
            match attempt {
                Ok(image) => images.push(image),
                Err(failure) => failures.push(failure),
            }
        }

        if images.is_empty() {
            return Err(AdCraftError::AllAttemptsFailed {
                attempts: ideas.len(),
            });
        }

        tracing::info!(
            ideas = ideas.len(),
            images = images.len(),
            failed = failures.len(),
            "ad campaign ready"
        );

        Ok(AdCampaign {
            images,
            ideas,
            failures,
        })
    }
}

impl<B> std::fmt::Debug for AdGenerator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdGenerator")
            .field("clients", &self.clients)
            .field("concepts", &self.concepts)
            .field("images", &self.images)
            .field("locale", &self.locale)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::wire::{InlineData, Part};
    use crate::gemini::{GenerateContentRequest, GenerateContentResponse};
    use crate::types::CampaignStatus;
    use async_trait::async_trait;
    use base64::Engine;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PHOTO: [u8; 8] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];

    /// Concept calls return `concepts`; image calls succeed iff the prompt is in `succeed`.
    struct FakeGemini {
        concepts: std::result::Result<String, u16>,
        succeed: HashSet<String>,
        image_calls: AtomicUsize,
        uploads: Mutex<Vec<InlineData>>,
    }

    impl FakeGemini {
        fn new(prompts: &[&str], succeed: &[&str]) -> Self {
            let ideas: Vec<_> = prompts
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    json!({
                        "title": format!("Idea {}", i + 1),
                        "description": format!("Copy {}", i + 1),
                        "imagePrompt": p
                    })
                })
                .collect();
            Self {
                concepts: Ok(json!({ "ideas": ideas }).to_string()),
                succeed: succeed.iter().map(|s| s.to_string()).collect(),
                image_calls: AtomicUsize::new(0),
                uploads: Mutex::new(Vec::new()),
            }
        }

        fn failing_concepts(status: u16) -> Self {
            Self {
                concepts: Err(status),
                ..Self::new(&[], &[])
            }
        }
    }

    fn image_bytes(prompt: &str) -> Vec<u8> {
        format!("png-bytes-for-{prompt}").into_bytes()
    }

    #[async_trait]
    impl GenerativeBackend for FakeGemini {
        async fn generate_content(
            &self,
            model: &str,
            request: &GenerateContentRequest,
        ) -> Result<GenerateContentResponse> {
            for part in request.parts() {
                if let Part::InlineData { inline_data } = part {
                    self.uploads.lock().unwrap().push(inline_data.clone());
                }
            }

            if model == ConceptModel::Flash.as_str() {
                return match &self.concepts {
                    Ok(text) => Ok(serde_json::from_value(json!({
                        "candidates": [{"content": {"parts": [{"text": text}]}}]
                    }))?),
                    Err(status) => Err(AdCraftError::Api {
                        status: *status,
                        message: "concept failure".into(),
                    }),
                };
            }

            self.image_calls.fetch_add(1, Ordering::SeqCst);
            let prompt = request.prompt_text();
            if self.succeed.contains(&prompt) {
                let data = base64::engine::general_purpose::STANDARD.encode(image_bytes(&prompt));
                Ok(serde_json::from_value(json!({
                    "candidates": [{"content": {"parts": [
                        {"inlineData": {"mimeType": "image/png", "data": data}}
                    ]}, "finishReason": "STOP"}]
                }))?)
            } else {
                Ok(serde_json::from_value(json!({
                    "candidates": [{"finishReason": "IMAGE_SAFETY"}]
                }))?)
            }
        }
    }

    fn generator(fake: FakeGemini) -> (AdGenerator<FakeGemini>, Arc<ClientFactory<FakeGemini>>) {
        let clients = Arc::new(ClientFactory::from_client(fake));
        let generator = AdGenerator::builder()
            .locale(Locale::English)
            .build_with(Arc::clone(&clients));
        (generator, clients)
    }

    const SIX: [&str; 6] = ["p1", "p2", "p3", "p4", "p5", "p6"];

    #[tokio::test]
    async fn test_partial_success_keeps_all_ideas() {
        let (generator, clients) =
            generator(FakeGemini::new(&SIX, &["p1", "p2", "p4", "p6"]));

        let campaign = generator
            .run_bytes(PHOTO.to_vec(), "image/jpeg")
            .await
            .unwrap();

        assert_eq!(campaign.images.len(), 4);
        assert_eq!(campaign.ideas.len(), 6);
        assert_eq!(campaign.failures.len(), 2);
        assert_eq!(campaign.status(), CampaignStatus::Partial);

        let fake = clients.get().await.unwrap();
        assert_eq!(fake.image_calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_odd_successes_keep_order_and_prompts() {
        let (generator, _) = generator(FakeGemini::new(&SIX, &["p1", "p3", "p5"]));

        let campaign = generator
            .run_bytes(PHOTO.to_vec(), "image/jpeg")
            .await
            .unwrap();

        let prompts: Vec<&str> = campaign.images.iter().map(|i| i.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["p1", "p3", "p5"]);
        for image in &campaign.images {
            assert_eq!(image.prompt, campaign.ideas[image.idea_index].image_prompt);
            assert_eq!(image.decode().unwrap(), image_bytes(&image.prompt));
        }
        let failed: Vec<usize> = campaign.failures.iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_complete_success() {
        let (generator, _) = generator(FakeGemini::new(&SIX, &SIX));
        let campaign = generator
            .run_bytes(PHOTO.to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(campaign.images.len(), 6);
        assert_eq!(campaign.status(), CampaignStatus::Complete);
    }

    #[tokio::test]
    async fn test_all_failures_is_an_error() {
        let (generator, _) = generator(FakeGemini::new(&SIX, &[]));

        let err = generator
            .run_bytes(PHOTO.to_vec(), "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, AdCraftError::AllAttemptsFailed { attempts: 6 }));
    }

    #[tokio::test]
    async fn test_zero_ideas_never_fans_out() {
        let (generator, clients) = generator(FakeGemini::new(&[], &[]));

        let err = generator
            .run_bytes(PHOTO.to_vec(), "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, AdCraftError::Generation(_)));
        let fake = clients.get().await.unwrap();
        assert_eq!(fake.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concept_failure_is_fatal() {
        let (generator, clients) = generator(FakeGemini::failing_concepts(503));

        let err = generator
            .run_bytes(PHOTO.to_vec(), "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, AdCraftError::Generation(_)));
        assert_eq!(
            clients.get().await.unwrap().image_calls.load(Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn test_fewer_ideas_than_requested() {
        let (generator, _) = generator(FakeGemini::new(&["p1", "p2"], &["p2"]));
        let campaign = generator
            .run_bytes(PHOTO.to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(campaign.ideas.len(), 2);
        assert_eq!(campaign.images.len(), 1);
        assert_eq!(campaign.images[0].idea_index, 1);
    }

    #[tokio::test]
    async fn test_image_encoded_once_and_shared() {
        let (generator, clients) = generator(FakeGemini::new(&SIX, &SIX));
        generator
            .run_bytes(PHOTO.to_vec(), "image/jpeg")
            .await
            .unwrap();

        let fake = clients.get().await.unwrap();
        let uploads = fake.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 7);
        let expected = InlineData {
            mime_type: "image/jpeg".into(),
            data: base64::engine::general_purpose::STANDARD.encode(PHOTO),
        };
        assert!(uploads.iter().all(|u| *u == expected));
    }

    #[tokio::test]
    async fn test_unreadable_upload_is_input_error() {
        let (generator, clients) = generator(FakeGemini::new(&SIX, &SIX));

        let err = generator.run_bytes(Vec::new(), "image/png").await.unwrap_err();
        assert!(matches!(err, AdCraftError::Input(_)));

        let err = generator
            .run_path("/no/such/product.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, AdCraftError::Input(_)));

        assert!(clients.get().await.unwrap().uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let generator = AdGenerator::builder()
            .key_provider(EnvKeyProvider::with_vars(["GEMINI_API_KEY"]).with_lookup(|_| None))
            .build()
            .unwrap();

        let err = generator
            .run_bytes(PHOTO.to_vec(), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, AdCraftError::Configuration(_)));
        assert!(err.user_message(Locale::English).contains("API key"));
    }

    #[tokio::test]
    async fn test_stage_progression() {
        let (generator, _) = generator(FakeGemini::new(&SIX, &["p2"]));
        let stages = Mutex::new(Vec::new());

        generator
            .run_with_progress(
                Upload::Bytes {
                    bytes: PHOTO.to_vec(),
                    mime_type: "image/jpeg".into(),
                },
                |stage| stages.lock().unwrap().push(stage),
            )
            .await
            .unwrap();

        assert_eq!(
            *stages.lock().unwrap(),
            vec![
                Stage::Idle,
                Stage::Encoding,
                Stage::ConceptsPending,
                Stage::ImagesPending,
                Stage::PartialSuccess
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_stage_reported() {
        let (generator, _) = generator(FakeGemini::new(&SIX, &[]));
        let last = Mutex::new(Stage::Idle);

        let _ = generator
            .run_with_progress(
                Upload::Bytes {
                    bytes: PHOTO.to_vec(),
                    mime_type: "image/jpeg".into(),
                },
                |stage| *last.lock().unwrap() = stage,
            )
            .await;

        assert_eq!(*last.lock().unwrap(), Stage::Failed);
    }

    /// Ideas come back at once; every image call takes 300 ms.
    struct SlowImages {
        started: AtomicUsize,
        completed: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeBackend for SlowImages {
        async fn generate_content(
            &self,
            model: &str,
            _request: &GenerateContentRequest,
        ) -> Result<GenerateContentResponse> {
            if model == ConceptModel::Flash.as_str() {
                let ideas: Vec<_> = SIX
                    .iter()
                    .map(|p| json!({"title": "t", "description": "d", "imagePrompt": p}))
                    .collect();
                let text = json!({ "ideas": ideas }).to_string();
                return Ok(serde_json::from_value(json!({
                    "candidates": [{"content": {"parts": [{"text": text}]}}]
                }))?);
            }
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(GenerateContentResponse::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_aborts_image_requests() {
        let clients = Arc::new(ClientFactory::from_client(SlowImages {
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }));
        let generator = AdGenerator::builder().build_with(Arc::clone(&clients));

        let run = generator.run_bytes(PHOTO.to_vec(), "image/jpeg");
        assert!(tokio::time::timeout(Duration::from_millis(50), run)
            .await
            .is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;

        let backend = clients.get().await.unwrap();
        assert_eq!(backend.started.load(Ordering::SeqCst), 6);
        assert_eq!(backend.completed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_builder_clamps_idea_count() {
        let clients = Arc::new(ClientFactory::from_client(FakeGemini::new(&[], &[])));
        let generator = AdGeneratorBuilder::new()
            .idea_count(50)
            .build_with(Arc::clone(&clients));
        assert_eq!(generator.idea_count(), MAX_IDEA_COUNT);

        let generator = AdGeneratorBuilder::new().idea_count(0).build_with(clients);
        assert_eq!(generator.idea_count(), 1);
    }

    #[test]
    fn test_builder_defaults() {
        let generator = AdGenerator::builder().api_key("k").build().unwrap();
        assert_eq!(generator.idea_count(), DEFAULT_IDEA_COUNT);
        assert_eq!(generator.locale(), Locale::Arabic);
    }
}
