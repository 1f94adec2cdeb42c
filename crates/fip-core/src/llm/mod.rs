//! LLM client stack: provider abstraction, retry/circuit-breaker
//! wrapper, and structured-JSON completion.
//!
//! [`client::RetryingLlmClient`] wraps any [`LlmProvider`] with retry,
//! backoff, and circuit-breaker policy so callers never deal with a raw
//! transport failure directly.

pub mod circuit;
pub mod client;
pub mod openai_compat;

pub use circuit::CircuitBreaker;
pub use client::RetryingLlmClient;

use crate::error::LlmError;
use tokio_util::sync::CancellationToken;

/// Token usage information from an LLM completion.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Accumulate token counts from another usage record (e.g. across retries).
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Response from an LLM completion request.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub model: String,
}

/// Parameters controlling LLM generation behavior.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Optional system prompt override. If `Some`, replaces the caller's system prompt.
    pub system_prompt: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            system_prompt: None,
        }
    }
}

/// Trait abstracting a single, unretried call to an LLM provider.
/// Object-safe for use as `Arc<dyn LlmProvider>`. Retry, circuit
/// breaking, and JSON repair all live one layer up in
/// [`client::RetryingLlmClient`], which wraps any `LlmProvider`.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the display name of this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a completion request to the LLM.
    async fn complete(
        &self,
        system: &str,
        user_message: &str,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<LlmResponse, LlmError>;

    /// List available models, used as the first tier of `health_probe`.
    async fn list_models(&self, cancel: CancellationToken) -> Result<(), LlmError>;

    /// Mesh-native tags listing (Ollama-style `/api/tags`), used as the
    /// second tier of `health_probe` for providers reachable only over
    /// the mesh transport.
    async fn list_tags(&self, cancel: CancellationToken) -> Result<(), LlmError>;
}
