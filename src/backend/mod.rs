//! Backend trait and normalized request types.
//!
//! The [`Backend`] trait abstracts over generative completion providers,
//! translating a normalized [`LlmRequest`] into the provider's streaming HTTP
//! API and handing back a [`TokenStream`] of text deltas.
//!
//! ## Architecture
//!
//! ```text
//! LlmStage ──► LlmRequest ──► Backend::stream() ──► TokenStream
//!                                    │
//!                         ┌──────────┴──────────┐
//!                    OpenAiBackend          MockBackend
//!                 /v1/chat/completions     scripted replies
//!                    SSE streaming
//! ```
//!
//! Opening a stream performs the request and checks the status code. The
//! returned stream owns the response body: dropping it closes the request.

pub mod mock;
pub mod openai;
pub mod sse;

pub use mock::{MockBackend, MockReply};
pub use openai::OpenAiBackend;

use crate::config::LlmConfig;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::Client;

/// Text deltas as the provider emits them.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// A normalized LLM request, provider-agnostic.
///
/// There is no conversation history: every request is the system
/// instruction plus one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"gpt-4o"`).
    pub model: String,

    /// Role-defining system instruction.
    pub system_prompt: String,

    /// The user prompt text.
    pub prompt: String,

    /// LLM configuration (temperature, max_tokens, json_mode).
    pub config: LlmConfig,
}

/// Abstraction over LLM providers.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send `request` and return the stream of generated text.
    ///
    /// Connection and status errors are returned here; failures after the
    /// response started arrive as `Err` items on the stream.
    async fn stream(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<TokenStream>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}
