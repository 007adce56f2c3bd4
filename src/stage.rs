//! Stage adapters: the two steps a [`Pipeline`](crate::Pipeline) sequences.
//!
//! A [`Stage`] turns one input text into a lazy stream of text fragments.
//! [`LlmStage`] does so with a role-defining system instruction and a
//! generative [`Backend`]; [`SearchStage`](crate::search::SearchStage) with a
//! paper index.

use crate::{
    backend::{Backend, LlmRequest},
    config::{BackendConfig, LlmConfig},
    error::Result,
    prompt, PipelineError,
};
use futures::stream::BoxStream;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, pinned, Send future -- the return type of [`Stage::open`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text fragments emitted by a stage, in emission order.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Object-safe trait for pipeline stages.
///
/// Implementations are configured once and are otherwise stateless: every
/// call to [`open`](Stage::open) starts from scratch, with nothing carried
/// over from earlier calls. The returned future and stream own everything
/// they need, so a stage can serve many runs at once.
pub trait Stage: Send + Sync {
    /// Stable identifier for the stage type (e.g. `"llm"`, `"search"`).
    fn kind(&self) -> &'static str;

    /// Instance name (for logging).
    fn name(&self) -> &str;

    /// Start producing output for `input`.
    ///
    /// Nothing happens until the returned future is polled.
    fn open(&self, input: String) -> BoxFut<'static, Result<TextStream>>;
}

/// Immutable settings shared by every request an [`LlmStage`] makes.
#[derive(Debug)]
struct LlmStageSpec {
    name: String,
    system_instruction: String,
    prompt_template: String,
    model: String,
    base_url: String,
    config: LlmConfig,
}

/// A stage backed by a generative completion provider.
///
/// # Example
///
/// ```no_run
/// use research_pipeline::backend::OpenAiBackend;
/// use research_pipeline::config::{BackendConfig, ModelCapabilities};
/// use research_pipeline::StageBuilder;
/// use std::sync::Arc;
///
/// # fn main() -> research_pipeline::Result<()> {
/// let caps = ModelCapabilities::for_model("gpt-4o").unwrap();
/// let config = BackendConfig::from_env("OPENAI_API_KEY", "https://api.openai.com", "gpt-4o", caps)?;
/// let backend = Arc::new(OpenAiBackend::new(config.api_key()));
///
/// let stage = StageBuilder::new("summarizer")
///     .system_instruction("You write literature reviews.")
///     .prompt("Papers:\n{input}")
///     .build(&config, backend)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LlmStage {
    spec: Arc<LlmStageSpec>,
    backend: Arc<dyn Backend>,
    client: Client,
}

impl std::fmt::Debug for LlmStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmStage")
            .field("name", &self.spec.name)
            .field("model", &self.spec.model)
            .field("backend", &self.backend.name())
            .field("config", &self.spec.config)
            .finish()
    }
}

impl LlmStage {
    pub fn system_instruction(&self) -> &str {
        &self.spec.system_instruction
    }

    pub fn prompt_template(&self) -> &str {
        &self.spec.prompt_template
    }

    pub fn model(&self) -> &str {
        &self.spec.model
    }

    pub fn config(&self) -> &LlmConfig {
        &self.spec.config
    }

    /// Render the prompt template with the stage input.
    pub fn render_prompt(&self, input: &str) -> String {
        prompt::render(&self.spec.prompt_template, input)
    }

    fn build_request(&self, input: &str) -> LlmRequest {
        LlmRequest {
            model: self.spec.model.clone(),
            system_prompt: self.spec.system_instruction.clone(),
            prompt: self.render_prompt(input),
            config: self.spec.config.clone(),
        }
    }
}

impl Stage for LlmStage {
    fn kind(&self) -> &'static str {
        "llm"
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn open(&self, input: String) -> BoxFut<'static, Result<TextStream>> {
        let request = self.build_request(&input);
        let backend = Arc::clone(&self.backend);
        let client = self.client.clone();
        let spec = Arc::clone(&self.spec);

        Box::pin(async move {
            tracing::debug!(
                stage = %spec.name,
                backend = backend.name(),
                model = %spec.model,
                "stage request"
            );
            backend.stream(&client, &spec.base_url, &request).await
        })
    }
}

/// Builder for [`LlmStage`] with construction-time validation.
pub struct StageBuilder {
    name: String,
    system_instruction: String,
    prompt_template: String,
    config: LlmConfig,
    client: Option<Client>,
}

impl StageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_instruction: String::new(),
            prompt_template: "{input}".to_string(),
            config: LlmConfig::default(),
            client: None,
        }
    }

    /// Role-defining instruction sent as the system message of every request.
    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// User-message template; `{input}` is replaced by the stage input and
    /// `{{`/`}}` escape literal braces.
    pub fn prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.config.temperature = temp;
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    pub fn json_mode(mut self, enabled: bool) -> Self {
        self.config.json_mode = enabled;
        self
    }

    /// Share an HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Validate against the backend's capabilities and build the stage.
    pub fn build(self, backend_config: &BackendConfig, backend: Arc<dyn Backend>) -> Result<LlmStage> {
        if self.system_instruction.trim().is_empty() {
            return Err(PipelineError::Configuration(format!(
                "stage '{}' requires a system instruction",
                self.name
            )));
        }

        if self.config.json_mode && !backend_config.capabilities().json_output {
            return Err(PipelineError::Configuration(format!(
                "stage '{}' requests JSON mode but model '{}' does not support JSON output",
                self.name,
                backend_config.model()
            )));
        }

        Ok(LlmStage {
            spec: Arc::new(LlmStageSpec {
                name: self.name,
                system_instruction: self.system_instruction,
                prompt_template: self.prompt_template,
                model: backend_config.model().to_string(),
                base_url: backend_config.base_url().to_string(),
                config: self.config,
            }),
            backend,
            client: self.client.unwrap_or_default(),
        })
    }
}
