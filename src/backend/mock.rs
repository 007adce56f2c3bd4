//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] replays scripted replies, allowing downstream consumers
//! to write deterministic tests against this crate. It records every request
//! it receives so tests can assert on call counts and on the context a stage
//! was given, and counts open streams so tests can see a request released.
//!
//! # Example
//!
//! ```
//! use research_pipeline::backend::MockBackend;
//!
//! let mock = MockBackend::fixed("Hello, world!");
//! assert_eq!(mock.calls(), 0);
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;

use super::{Backend, LlmRequest, TokenStream};
use crate::error::Result;
use crate::PipelineError;

/// One scripted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Stream these chunks, then end normally.
    Chunks(Vec<String>),
    /// Fail when the stream is opened (e.g. connection refused).
    FailOpen(String),
    /// Stream these chunks, then fail with the message.
    FailAfter(Vec<String>, String),
    /// Stream these chunks, then wait forever without ending.
    Stall(Vec<String>),
}

impl MockReply {
    /// Split `text` into chunks of at most `size` characters.
    pub fn chunked(text: &str, size: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        MockReply::Chunks(
            chars
                .chunks(size.max(1))
                .map(|c| c.iter().collect())
                .collect(),
        )
    }
}

type Responder = Box<dyn Fn(&LlmRequest) -> MockReply + Send + Sync>;

/// A test backend that serves scripted replies.
///
/// Scripted replies are served in order, cycling back to the beginning when
/// exhausted. Alternatively, a responder closure computes each reply from the
/// request. Between chunks the stream yields to the scheduler, so concurrent
/// runs interleave the way real network streams do.
pub struct MockBackend {
    replies: Vec<MockReply>,
    responder: Option<Responder>,
    index: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
    live: Arc<AtomicUsize>,
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("replies", &self.replies.len())
            .field("has_responder", &self.responder.is_some())
            .field("calls", &self.calls())
            .field("open_streams", &self.open_streams())
            .finish()
    }
}

impl MockBackend {
    /// Create a mock backend with the given scripted replies.
    pub fn new(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            replies,
            responder: None,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that always streams `response` as a single chunk.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Chunks(vec![response.into()])])
    }

    /// Create a mock whose replies are computed from each request.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest) -> MockReply + Send + Sync + 'static,
    {
        Self {
            replies: Vec::new(),
            responder: Some(Box::new(responder)),
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many streams have been requested.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, request: &LlmRequest) -> MockReply {
        if let Some(ref responder) = self.responder {
            return responder(request);
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn stream(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<TokenStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let (chunks, tail): (Vec<String>, TokenStream) = match self.next_reply(request) {
            MockReply::Chunks(chunks) => (chunks, futures::stream::empty().boxed()),
            MockReply::FailOpen(message) => return Err(PipelineError::Other(message)),
            MockReply::FailAfter(chunks, message) => (
                chunks,
                futures::stream::once(async move { Err(PipelineError::Other(message)) }).boxed(),
            ),
            MockReply::Stall(chunks) => (chunks, futures::stream::pending().boxed()),
        };

        let inner = futures::stream::iter(chunks.into_iter().map(Ok))
            .chain(tail)
            .then(|item| async move {
                tokio::task::yield_now().await;
                item
            })
            .boxed();

        Ok(Box::pin(Tracked {
            inner,
            _live: LiveStream::new(&self.live),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Counts itself in `live` for as long as it exists.
struct LiveStream(Arc<AtomicUsize>);

impl LiveStream {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Tracked {
    inner: TokenStream,
    _live: LiveStream,
}

impl Stream for Tracked {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    fn request(prompt: &str) -> LlmRequest {
        LlmRequest {
            model: "test".to_string(),
            system_prompt: "system".to_string(),
            prompt: prompt.to_string(),
            config: LlmConfig::default(),
        }
    }

    async fn drain(mock: &MockBackend, prompt: &str) -> Vec<Result<String>> {
        let client = Client::new();
        match mock.stream(&client, "http://unused", &request(prompt)).await {
            Ok(stream) => stream.collect().await,
            Err(e) => vec![Err(e)],
        }
    }

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let mock = MockBackend::fixed("Hello!");
        let items = drain(&mock, "hi").await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_deref().unwrap(), "Hello!");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_cycles_replies() {
        let mock = MockBackend::new(vec![
            MockReply::Chunks(vec!["first".into()]),
            MockReply::Chunks(vec!["second".into()]),
        ]);
        let r1 = drain(&mock, "a").await;
        let r2 = drain(&mock, "b").await;
        let r3 = drain(&mock, "c").await;
        assert_eq!(r1[0].as_deref().unwrap(), "first");
        assert_eq!(r2[0].as_deref().unwrap(), "second");
        assert_eq!(r3[0].as_deref().unwrap(), "first");
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_fail_after_chunks() {
        let mock = MockBackend::new(vec![MockReply::FailAfter(
            vec!["one".into()],
            "boom".into(),
        )]);
        let items = drain(&mock, "x").await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(PipelineError::Other(m)) if m == "boom"));
    }

    #[tokio::test]
    async fn test_mock_fail_open() {
        let mock = MockBackend::new(vec![MockReply::FailOpen("refused".into())]);
        let client = Client::new();
        let result = mock.stream(&client, "http://unused", &request("x")).await;
        assert!(matches!(result, Err(PipelineError::Other(ref m)) if m == "refused"));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_responder_sees_request() {
        let mock = MockBackend::with_responder(|req| {
            MockReply::Chunks(vec![format!("echo: {}", req.prompt)])
        });
        let items = drain(&mock, "quantum").await;
        assert_eq!(items[0].as_deref().unwrap(), "echo: quantum");
        assert_eq!(mock.requests()[0].prompt, "quantum");
    }

    #[tokio::test]
    async fn test_open_streams_tracks_release() {
        let mock = MockBackend::new(vec![MockReply::Stall(vec!["one".into()])]);
        let client = Client::new();

        let mut stream = mock.stream(&client, "http://unused", &request("x")).await.unwrap();
        assert_eq!(mock.open_streams(), 1);
        assert_eq!(stream.next().await.unwrap().unwrap(), "one");

        let stalled = tokio::time::timeout(std::time::Duration::from_millis(20), stream.next()).await;
        assert!(stalled.is_err());
        assert_eq!(mock.open_streams(), 1);

        drop(stream);
        assert_eq!(mock.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_finished_stream_released_on_drop() {
        let mock = MockBackend::fixed("done");
        let items = drain(&mock, "x").await;
        assert_eq!(items.len(), 1);
        assert_eq!(mock.open_streams(), 0);
    }

    #[test]
    fn test_chunked_splits_on_chars() {
        assert_eq!(
            MockReply::chunked("abcdé", 2),
            MockReply::Chunks(vec!["ab".into(), "cd".into(), "é".into()])
        );
    }
}
