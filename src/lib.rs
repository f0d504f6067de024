#![warn(missing_docs)]
//! AdCraft - AI-generated ad campaigns from a single product photo.
//!
//! Upload a product image and get back several advertising images together
//! with a title and ad copy for each concept, generated by Gemini.
//!
//! # Quick Start
//!
//! ```no_run
//! use adcraft::AdGenerator;
//!
//! #[tokio::main]
//! async fn main() -> adcraft::Result<()> {
//!     let generator = AdGenerator::builder().build()?;
//!     let campaign = generator.run_path("product.jpg").await?;
//!
//!     for idea in &campaign.ideas {
//!         println!("{}: {}", idea.title, idea.description);
//!     }
//!     for image in &campaign.images {
//!         std::fs::write(image.file_name(), image.decode()?)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Pipeline
//!
//! 1. The upload is encoded once ([`EncodedImage`]).
//! 2. The text model proposes campaign ideas ([`AdIdea`]) following a strict
//!    JSON schema. Failure here fails the run.
//! 3. One image request per idea runs concurrently. Failed attempts are
//!    recorded and skipped; the run fails only if every attempt fails.
//!
//! The API key is read lazily, once, through a [`KeyProvider`]
//! (`GEMINI_API_KEY`, `GOOGLE_API_KEY` or `API_KEY` by default).

pub mod client;
pub mod concepts;
pub mod encoder;
mod error;
pub mod fanout;
pub mod gemini;
pub mod generator;
pub mod key;
pub mod types;

// Re-export error types at crate root
pub use error::{AdCraftError, Locale, Result};

pub use client::ClientFactory;
pub use concepts::ConceptGenerator;
pub use encoder::{EncodedImage, ImageFormat};
pub use fanout::{ImageAttempt, ImageAttemptFailure, ImageFanOut};
pub use gemini::{ConceptModel, GeminiClient, GenerativeBackend, ImageModel};
pub use generator::{AdGenerator, AdGeneratorBuilder, Stage, Upload};
pub use key::{EnvKeyProvider, KeyProvider, StaticKeyProvider};
pub use types::{AdCampaign, AdIdea, AdImage, CampaignStatus};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{AdCraftError, Locale, Result};
    pub use crate::generator::{AdGenerator, Stage, Upload};
    pub use crate::key::KeyProvider;
    pub use crate::types::{AdCampaign, AdIdea, AdImage};
}
