//! # Research Pipeline
//!
//! A two-stage research assistant: a **producer** stage gathers papers on a
//! topic, then a **consumer** stage writes a literature review from them.
//! Both stages stream, and the caller sees their output as one merged
//! sequence of [`Chunk`]s tagged by [`Origin`].
//!
//! ## Core Concepts
//!
//! - **[`Stage`]**: an object-safe trait, one input text in, a lazy stream of
//!   text fragments out. [`LlmStage`] talks to a generative [`Backend`](backend::Backend);
//!   [`SearchStage`](search::SearchStage) queries a paper index.
//! - **[`Pipeline`]**: the coordinator. Runs the producer to completion,
//!   decodes its output into a [`RecordCollection`] when it can, and always
//!   hands the raw text to the consumer.
//! - **[`RunStream`]**: the merged chunk sequence of one run. It owns the
//!   run's [`PipelineRun`] buffers; dropping it abandons the run.
//! - **[`output_parser`]**: best-effort extraction of the first JSON list of
//!   objects from chatty model output.
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use research_pipeline::config::{BackendConfig, ModelCapabilities};
//! use research_pipeline::research::research_pipeline;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let caps = ModelCapabilities::for_model("gpt-4o").unwrap();
//!     let config = BackendConfig::from_env("OPENAI_API_KEY", "https://api.openai.com", "gpt-4o", caps)?;
//!     let pipeline = research_pipeline(&config)?;
//!
//!     let mut stream = pipeline.run("Agentic AI")?;
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", chunk?.text);
//!     }
//!     if let Some(records) = stream.run().records() {
//!         println!("\n{}", records);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod output_parser;
pub mod pipeline;
pub mod prompt;
pub mod research;
pub mod search;
pub mod stage;
pub mod types;

pub use backend::{MockBackend, OpenAiBackend};
pub use config::{BackendConfig, LlmConfig, ModelCapabilities, ModelFamily};
pub use error::{PipelineError, Result};
pub use output_parser::{decode_records, ParseError};
pub use pipeline::{Pipeline, PipelineBuilder, RunStream};
pub use search::{ArxivSearch, PaperSearch, SearchQuery, SearchStage, SortCriterion, SortOrder};
pub use stage::{BoxFut, LlmStage, Stage, StageBuilder, TextStream};
pub use types::{Chunk, CollectionStats, Origin, PipelineRun, Record, RecordCollection};
