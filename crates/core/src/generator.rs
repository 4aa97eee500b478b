//! TextGenerator trait — the abstraction over generative text backends.
//!
//! Implementations: Gemini `generateContent`, OpenAI-compatible endpoints.

use async_trait::async_trait;

use crate::error::GeneratorError;

/// The core TextGenerator trait.
///
/// The chat relay calls `generate()` without knowing which backend is
/// configured.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// A human-readable name for this backend (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a prompt and get the complete reply text.
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> Result<bool, GeneratorError> {
        Ok(true)
    }
}
