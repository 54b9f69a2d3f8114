//! Completion provider trait and supporting types.

use async_trait::async_trait;
use thiserror::Error;

/// A single completion request.
///
/// The executor issues exactly one user message per sample; conversation
/// history never accumulates, which is what keeps microsteps atomic.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier, as declared on the agent.
    pub model: String,
    /// System prompt: agent instruction plus the reliability preamble.
    pub system_prompt: String,
    /// The assembled microstep prompt.
    pub user_prompt: String,
    /// Sampling temperature for this request.
    pub temperature: f64,
    /// Completion token cap.
    pub max_tokens: u32,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Tokens in the completion.
    pub output_tokens: u32,
}

/// A completion response.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Generated content.
    pub content: String,
    /// Token accounting.
    pub usage: Usage,
}

/// Per-sample provider failures.
///
/// These never escalate: the executor recovers locally by red-flagging the
/// affected sample, which costs a vote but not the round.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider returned a protocol-level error.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The provider asked us to back off.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The provider could not be reached at all.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Trait for completion providers.
///
/// Implement this to connect a model backend. Implementations must be safe
/// to call concurrently: the sampler fans out one call per parallel sample.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g. "openai", "anthropic").
    fn name(&self) -> &str;

    /// Generate a single completion.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the backend call fails.
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, ProviderError>;
}
