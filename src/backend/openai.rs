//! Backend for OpenAI-compatible APIs.
//!
//! [`OpenAiBackend`] covers OpenAI itself and the many servers that speak
//! its protocol (vLLM, llama.cpp server, LM Studio, Groq, Ollama's `/v1/`).
//!
//! Endpoint: `/v1/chat/completions` (always chat mode, always streaming).
//! Streaming: SSE with `data: {"choices": [{"delta": {"content": "token"}}]}`.

use super::sse::{SseDecoder, SseFrame};
use super::{Backend, LlmRequest, TokenStream};
use crate::config::redact;
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::VecDeque;

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use research_pipeline::backend::OpenAiBackend;
///
/// let backend = OpenAiBackend::new("sk-...").with_organization("org-abc");
/// assert!(backend.has_organization());
/// ```
#[derive(Clone)]
pub struct OpenAiBackend {
    /// Sent as `Authorization: Bearer {key}`.
    api_key: String,
    /// If set, sent as `OpenAI-Organization: {org}`.
    organization: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("api_key", &redact(&self.api_key))
            .field("organization", &self.organization)
            .finish()
    }
}

impl OpenAiBackend {
    /// Create a backend authenticating with `api_key`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            organization: None,
        }
    }

    /// Set the organization ID header.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Returns `true` if an organization ID has been configured.
    pub fn has_organization(&self) -> bool {
        self.organization.is_some()
    }

    /// Build the request body for `/v1/chat/completions`.
    fn build_body(request: &LlmRequest) -> Value {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(json!({"role": "system", "content": request.system_prompt}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.config.temperature,
            "max_tokens": request.config.max_tokens,
            "stream": true,
        });

        if request.config.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        body
    }

    /// Parse a `Retry-After` header value as seconds.
    fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
        value
            .trim()
            .parse::<u64>()
            .ok()
            .map(std::time::Duration::from_secs)
    }

    /// Build the reqwest request with appropriate headers.
    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        let mut req = client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body);

        if let Some(ref org) = self.organization {
            req = req.header("OpenAI-Organization", org.as_str());
        }

        req
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn stream(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<TokenStream> {
        let base = base_url.trim_end_matches('/');
        let url = format!("{}/v1/chat/completions", base);
        let body = Self::build_body(request);

        tracing::debug!(model = %request.model, url = %url, "opening chat completion stream");

        let resp = self
            .build_http_request(client, &url, &body)
            .send()
            .await
            .map_err(|e| {
                PipelineError::Other(format!("Failed to connect to LLM at {}: {}", url, e))
            })?;

        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(Self::parse_retry_after);
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError {
                status,
                body: text,
                retry_after,
            });
        }

        Ok(sse_deltas(Box::pin(resp.bytes_stream())))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

struct SseState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    finished: bool,
}

/// Turn a raw SSE byte stream into content deltas.
///
/// Ends at `[DONE]` or end of body; an in-band error payload or transport
/// error is yielded once and ends the stream.
fn sse_deltas<S, B, E>(body: S) -> TokenStream
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<PipelineError> + Send,
{
    let state = SseState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.pending.pop_front() {
                match frame {
                    SseFrame::Delta(text) => return Some((Ok(text), st)),
                    SseFrame::Done => return None,
                    SseFrame::Error(message) => {
                        st.pending.clear();
                        st.finished = true;
                        return Some((Err(PipelineError::Provider(message)), st));
                    }
                }
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    let frames = st.decoder.decode(bytes.as_ref());
                    st.pending.extend(frames);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.finished = true;
                    let frames = st.decoder.flush();
                    st.pending.extend(frames);
                }
            }
        }
    })
    .boxed()
}
