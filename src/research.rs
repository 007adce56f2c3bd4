//! Ready-made research pipelines: paper discovery followed by a literature review.

use crate::{
    backend::{Backend, OpenAiBackend},
    config::BackendConfig,
    error::Result,
    pipeline::Pipeline,
    prompt::{
        CONSUMER_INSTRUCTION, CONSUMER_TASK_TEMPLATE, PRODUCER_INSTRUCTION,
        PRODUCER_TASK_TEMPLATE,
    },
    search::{PaperSearch, SearchStage},
    stage::{LlmStage, StageBuilder},
};
use reqwest::Client;
use std::sync::Arc;

/// Stage names, as they appear in logs.
pub const PRODUCER_NAME: &str = "arxiv_researcher";
pub const CONSUMER_NAME: &str = "summarizer";

/// The literature-review stage shared by both pipelines.
pub fn review_stage(
    config: &BackendConfig,
    backend: Arc<dyn Backend>,
    client: Client,
) -> Result<LlmStage> {
    StageBuilder::new(CONSUMER_NAME)
        .system_instruction(CONSUMER_INSTRUCTION)
        .prompt(CONSUMER_TASK_TEMPLATE)
        .client(client)
        .build(config, backend)
}

/// Both stages driven by the configured model over an OpenAI-compatible API.
pub fn research_pipeline(config: &BackendConfig) -> Result<Pipeline> {
    let backend: Arc<dyn Backend> = Arc::new(OpenAiBackend::new(config.api_key()));
    research_pipeline_with(config, backend)
}

/// Like [`research_pipeline`], with a caller-supplied backend.
pub fn research_pipeline_with(config: &BackendConfig, backend: Arc<dyn Backend>) -> Result<Pipeline> {
    let client = Client::new();

    let producer = StageBuilder::new(PRODUCER_NAME)
        .system_instruction(PRODUCER_INSTRUCTION)
        .prompt(PRODUCER_TASK_TEMPLATE)
        .client(client.clone())
        .build(config, Arc::clone(&backend))?;
    let consumer = review_stage(config, backend, client)?;

    Ok(Pipeline::new(producer, consumer))
}

/// Papers come straight from `search`; only the review uses the model.
pub fn search_backed_pipeline(
    config: &BackendConfig,
    search: Arc<dyn PaperSearch>,
    max_results: usize,
) -> Result<Pipeline> {
    let backend: Arc<dyn Backend> = Arc::new(OpenAiBackend::new(config.api_key()));
    search_backed_pipeline_with(config, backend, search, max_results)
}

/// Like [`search_backed_pipeline`], with a caller-supplied backend.
pub fn search_backed_pipeline_with(
    config: &BackendConfig,
    backend: Arc<dyn Backend>,
    search: Arc<dyn PaperSearch>,
    max_results: usize,
) -> Result<Pipeline> {
    let producer = SearchStage::new(PRODUCER_NAME, search).with_max_results(max_results);
    let consumer = review_stage(config, backend, Client::new())?;
    Ok(Pipeline::new(producer, consumer))
}
