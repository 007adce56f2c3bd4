//! Two-stage pipeline coordinator.
//!
//! A [`Pipeline`] runs a producer [`Stage`] to completion, then hands its
//! accumulated output to a consumer [`Stage`]. Both stages' output reaches the
//! caller as one [`RunStream`] of [`Chunk`]s tagged by origin.

use crate::{
    error::Result,
    output_parser::decode_records,
    stage::{BoxFut, Stage, TextStream},
    types::{Chunk, Origin, PipelineRun},
    PipelineError,
};
use futures::stream::FusedStream;
use futures::{ready, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Producer/consumer pipeline.
///
/// Stages are shared read-only across runs; each call to [`run`](Self::run)
/// gets its own buffers, so one pipeline can serve concurrent topics.
///
/// # Example
///
/// ```
/// use research_pipeline::backend::MockBackend;
/// use research_pipeline::config::{BackendConfig, ModelCapabilities};
/// use research_pipeline::{Pipeline, StageBuilder};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> research_pipeline::Result<()> {
/// let caps = ModelCapabilities::for_model("gpt-4o").unwrap();
/// let config = BackendConfig::new("http://localhost:8080", "gpt-4o", "sk-test", caps)?;
///
/// let producer = StageBuilder::new("papers")
///     .system_instruction("List papers as JSON.")
///     .build(&config, Arc::new(MockBackend::fixed(r#"[{"title": "A", "arxiv_url": "http://a"}]"#)))?;
/// let consumer = StageBuilder::new("review")
///     .system_instruction("Write a review.")
///     .build(&config, Arc::new(MockBackend::fixed("A is great.")))?;
///
/// let pipeline = Pipeline::new(producer, consumer);
/// let run = pipeline.run_to_completion("Agentic AI", |chunk| print!("{}", chunk.text)).await?;
/// assert_eq!(run.records().map(|r| r.len()), Some(1));
/// assert_eq!(run.consumer_text(), "A is great.");
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    producer: Arc<dyn Stage>,
    consumer: Arc<dyn Stage>,
    cancellation: Option<Arc<AtomicBool>>,
    cancel_token: Option<CancellationToken>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("producer", &self.producer.name())
            .field("consumer", &self.consumer.name())
            .field("has_cancellation", &self.cancellation.is_some())
            .field("has_cancel_token", &self.cancel_token.is_some())
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline from two stages, without a cancellation flag.
    pub fn new(producer: impl Stage + 'static, consumer: impl Stage + 'static) -> Self {
        Self {
            producer: Arc::new(producer),
            consumer: Arc::new(consumer),
            cancellation: None,
            cancel_token: None,
        }
    }

    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn producer(&self) -> &dyn Stage {
        self.producer.as_ref()
    }

    pub fn consumer(&self) -> &dyn Stage {
        self.consumer.as_ref()
    }

    /// Start a run for `topic`.
    ///
    /// Fails with [`PipelineError::InvalidInput`] when `topic` is blank; no
    /// stage is touched in that case. Otherwise nothing happens until the
    /// returned stream is polled.
    pub fn run(&self, topic: &str) -> Result<RunStream> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::InvalidInput(
                "topic must not be empty".to_string(),
            ));
        }

        tracing::info!(
            topic,
            producer = self.producer.name(),
            consumer = self.consumer.name(),
            "starting pipeline run"
        );

        Ok(RunStream {
            run: PipelineRun::new(topic),
            consumer: Arc::clone(&self.consumer),
            cancellation: self.cancellation.clone(),
            cancel_wait: self
                .cancel_token
                .clone()
                .map(|token| Box::pin(token.cancelled_owned())),
            phase: Phase::Opening {
                origin: Origin::Producer,
                fut: self.producer.open(topic.to_string()),
            },
        })
    }

    /// Drive a run to the end, calling `on_chunk` for every chunk.
    ///
    /// Returns the finished [`PipelineRun`], or the first error.
    pub async fn run_to_completion<F>(&self, topic: &str, mut on_chunk: F) -> Result<PipelineRun>
    where
        F: FnMut(&Chunk),
    {
        let mut stream = self.run(topic)?;
        while let Some(chunk) = stream.next().await {
            on_chunk(&chunk?);
        }
        Ok(stream.into_run())
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    producer: Option<Arc<dyn Stage>>,
    consumer: Option<Arc<dyn Stage>>,
    cancellation: Option<Arc<AtomicBool>>,
    cancel_token: Option<CancellationToken>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn producer(mut self, stage: impl Stage + 'static) -> Self {
        self.producer = Some(Arc::new(stage));
        self
    }

    pub fn consumer(mut self, stage: impl Stage + 'static) -> Self {
        self.consumer = Some(Arc::new(stage));
        self
    }

    /// Use an already shared producer stage.
    pub fn shared_producer(mut self, stage: Arc<dyn Stage>) -> Self {
        self.producer = Some(stage);
        self
    }

    /// Use an already shared consumer stage.
    pub fn shared_consumer(mut self, stage: Arc<dyn Stage>) -> Self {
        self.consumer = Some(stage);
        self
    }

    /// Set a cancellation flag that can be used to abort every run of the pipeline.
    ///
    /// The flag is only read when a [`RunStream`] is polled. Setting it does
    /// not wake a task that is waiting on a silent backend; such a run ends
    /// at its next chunk. Use [`with_cancellation_token`](Self::with_cancellation_token)
    /// to stop a waiting run at once.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(cancel);
        self
    }

    /// Set a token whose cancellation aborts every run of the pipeline.
    ///
    /// Cancelling the token wakes the task polling each run, so a run that
    /// is waiting on its backend yields [`PipelineError::Cancelled`] right
    /// away and releases the request.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Build the pipeline, validating configuration.
    pub fn build(self) -> Result<Pipeline> {
        let producer = self.producer.ok_or_else(|| {
            PipelineError::Configuration("pipeline requires a producer stage".to_string())
        })?;
        let consumer = self.consumer.ok_or_else(|| {
            PipelineError::Configuration("pipeline requires a consumer stage".to_string())
        })?;

        Ok(Pipeline {
            producer,
            consumer,
            cancellation: self.cancellation,
            cancel_token: self.cancel_token,
        })
    }
}

enum Phase {
    Opening {
        origin: Origin,
        fut: BoxFut<'static, Result<TextStream>>,
    },
    Streaming {
        origin: Origin,
        stream: TextStream,
    },
    Finished,
}

impl Phase {
    fn label(&self) -> &'static str {
        match self {
            Phase::Opening { .. } => "opening",
            Phase::Streaming { .. } => "streaming",
            Phase::Finished => "finished",
        }
    }
}

/// The merged chunk sequence of one run.
///
/// Yields every producer chunk, the producer's final marker, then every
/// consumer chunk and the consumer's final marker. After an error it yields
/// `None`. Dropping the stream releases the open backend request.
///
/// The stream owns its [`PipelineRun`]: inspect it with [`run`](Self::run)
/// while streaming (e.g. [`records`](PipelineRun::records) once the producer
/// finished), or take it with [`into_run`](Self::into_run).
pub struct RunStream {
    run: PipelineRun,
    consumer: Arc<dyn Stage>,
    cancellation: Option<Arc<AtomicBool>>,
    cancel_wait: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    phase: Phase,
}

impl std::fmt::Debug for RunStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStream")
            .field("topic", &self.run.topic())
            .field("phase", &self.phase.label())
            .finish()
    }
}

impl RunStream {
    /// The run state accumulated so far.
    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    pub fn into_run(self) -> PipelineRun {
        self.run
    }

    /// Also registers the waker with the cancellation token, if any.
    fn is_cancelled(&mut self, cx: &mut Context<'_>) -> bool {
        let token_fired = match self.cancel_wait.as_mut() {
            Some(wait) => wait.as_mut().poll(cx).is_ready(),
            None => false,
        };
        token_fired
            || self
                .cancellation
                .as_ref()
                .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    fn fail(&mut self, origin: Origin, cause: PipelineError) -> PipelineError {
        self.phase = Phase::Finished;
        tracing::warn!(topic = self.run.topic(), stage = %origin, error = %cause, "stage failed");
        PipelineError::stage(origin, cause)
    }

    /// Close out `origin` and move on; returns its end-of-stage marker.
    fn finish_stage(&mut self, origin: Origin) -> Chunk {
        match origin {
            Origin::Producer => {
                let records = decode_records(self.run.producer_text());
                match &records {
                    Some(found) => tracing::info!(records = found.len(), "decoded producer records"),
                    None => tracing::info!("no record list in producer output; forwarding raw text"),
                }
                self.run.set_records(records);

                let context = self.run.producer_text().to_string();
                tracing::info!(
                    stage = %Origin::Consumer,
                    name = self.consumer.name(),
                    "producer complete, starting consumer"
                );
                self.phase = Phase::Opening {
                    origin: Origin::Consumer,
                    fut: self.consumer.open(context),
                };
            }
            Origin::Consumer => {
                self.phase = Phase::Finished;
                tracing::info!(
                    topic = self.run.topic(),
                    producer_bytes = self.run.producer_text().len(),
                    consumer_bytes = self.run.consumer_text().len(),
                    "pipeline run complete"
                );
            }
        }
        Chunk::end_of_stage(origin)
    }
}

impl Stream for RunStream {
    type Item = Result<Chunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if matches!(this.phase, Phase::Finished) {
                return Poll::Ready(None);
            }
            if this.is_cancelled(cx) {
                this.phase = Phase::Finished;
                tracing::warn!(topic = this.run.topic(), "pipeline run cancelled");
                return Poll::Ready(Some(Err(PipelineError::Cancelled)));
            }

            match &mut this.phase {
                Phase::Opening { origin, fut } => {
                    let origin = *origin;
                    match ready!(fut.as_mut().poll(cx)) {
                        Ok(stream) => {
                            tracing::info!(stage = %origin, "stage streaming");
                            this.phase = Phase::Streaming { origin, stream };
                        }
                        Err(e) => return Poll::Ready(Some(Err(this.fail(origin, e)))),
                    }
                }
                Phase::Streaming { origin, stream } => {
                    let origin = *origin;
                    let item = ready!(stream.poll_next_unpin(cx));
                    return Poll::Ready(Some(match item {
                        Some(Ok(text)) => {
                            this.run.append(origin, &text);
                            Ok(Chunk::fragment(origin, text))
                        }
                        Some(Err(e)) => Err(this.fail(origin, e)),
                        None => Ok(this.finish_stage(origin)),
                    }));
                }
                Phase::Finished => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for RunStream {
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }
}
