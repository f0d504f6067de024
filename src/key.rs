//! API key sources.

use crate::error::{AdCraftError, Result};
use async_trait::async_trait;

/// Environment variables checked by [`EnvKeyProvider::new`], in order.
pub const DEFAULT_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Supplies the secret API key. Called at most once per [`ClientFactory`](crate::ClientFactory).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Returns the API key, or [`AdCraftError::Configuration`] if none is available.
    async fn api_key(&self) -> Result<String>;
}

#[async_trait]
impl<K: KeyProvider + ?Sized> KeyProvider for std::sync::Arc<K> {
    async fn api_key(&self) -> Result<String> {
        (**self).api_key().await
    }
}

/// Reads the key from the first non-empty environment variable.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    vars: Vec<String>,
    lookup: fn(&str) -> Option<String>,
}

fn read_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

impl EnvKeyProvider {
    /// Checks [`DEFAULT_KEY_VARS`].
    pub fn new() -> Self {
        Self::with_vars(DEFAULT_KEY_VARS)
    }

    /// Checks the given variables in order.
    pub fn with_vars<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
            lookup: read_env,
        }
    }

    /// Replaces the process environment with `lookup` when resolving variables.
    pub fn with_lookup(mut self, lookup: fn(&str) -> Option<String>) -> Self {
        self.lookup = lookup;
        self
    }
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyProvider for EnvKeyProvider {
    async fn api_key(&self) -> Result<String> {
        self.vars
            .iter()
            .find_map(|var| {
                (self.lookup)(var)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
            .ok_or_else(|| {
                AdCraftError::Configuration(format!(
                    "API key not configured (checked {})",
                    self.vars.join(", ")
                ))
            })
    }
}

/// A key supplied directly by the caller.
#[derive(Clone)]
pub struct StaticKeyProvider(String);

impl StaticKeyProvider {
    /// Wraps an explicit key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Debug for StaticKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticKeyProvider(..)")
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn api_key(&self) -> Result<String> {
        let key = self.0.trim();
        if key.is_empty() {
            return Err(AdCraftError::Configuration("API key is empty".into()));
        }
        Ok(key.to_string())
    }
}
