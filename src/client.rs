//! Lazily initialised, shared AI client handle.

use crate::error::{AdCraftError, Result};
use crate::gemini::GeminiClient;
use crate::key::KeyProvider;
use std::sync::Arc;
use tokio::sync::OnceCell;

type Connect<B> = Box<dyn Fn(String) -> Result<B> + Send + Sync>;

/// Builds a client on first use and hands out the same instance afterwards.
///
/// Initialisation is single-flight: callers that arrive while the key is
/// being fetched wait for that fetch instead of starting their own. A failed
/// initialisation leaves the factory empty so a later call can try again.
pub struct ClientFactory<B> {
    key_provider: Arc<dyn KeyProvider>,
    connect: Connect<B>,
    client: OnceCell<Arc<B>>,
}

impl<B> ClientFactory<B> {
    /// Creates a factory that turns the provider's key into a client with `connect`.
    pub fn new<K, F>(key_provider: K, connect: F) -> Self
    where
        K: KeyProvider + 'static,
        F: Fn(String) -> Result<B> + Send + Sync + 'static,
    {
        Self {
            key_provider: Arc::new(key_provider),
            connect: Box::new(connect),
            client: OnceCell::new(),
        }
    }

    /// Wraps an already constructed client; the key provider is never consulted.
    pub fn from_client(client: B) -> Self
    where
        B: 'static,
    {
        let factory = Self::new(crate::key::StaticKeyProvider::new(""), |_| {
            Err(AdCraftError::Configuration("client already provided".into()))
        });
        // A fresh cell cannot already be set.
        let _ = factory.client.set(Arc::new(client));
        factory
    }

    /// Returns the shared client, creating it on the first call.
    pub async fn get(&self) -> Result<Arc<B>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                tracing::debug!("initialising generative AI client");
                let key = self.key_provider.api_key().await.map_err(|e| match e {
                    AdCraftError::Configuration(_) => e,
                    other => AdCraftError::Configuration(format!("key provider failed: {other}")),
                })?;
                let client = (self.connect)(key).map_err(|e| match e {
                    AdCraftError::Configuration(_) => e,
                    other => AdCraftError::Configuration(format!("cannot create client: {other}")),
                })?;
                Ok::<_, AdCraftError>(Arc::new(client))
            })
            .await
            .inspect_err(|e| tracing::error!("AI client initialisation failed: {e}"))?;

        Ok(Arc::clone(client))
    }

    /// Returns true once a client has been created.
    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }
}

impl ClientFactory<GeminiClient> {
    /// Factory for the public Gemini endpoint.
    pub fn gemini<K: KeyProvider + 'static>(key_provider: K) -> Self {
        Self::new(key_provider, |key| Ok(GeminiClient::new(key)))
    }

    /// Factory for a Gemini-compatible endpoint at `base_url`.
    pub fn gemini_with_base_url<K: KeyProvider + 'static>(
        key_provider: K,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self::new(key_provider, move |key| {
            Ok(GeminiClient::with_base_url(key, base_url.clone()))
        })
    }
}

impl<B> std::fmt::Debug for ClientFactory<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
