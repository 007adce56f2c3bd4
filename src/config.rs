//! Constructor-injected configuration for backends and stages.
//!
//! Nothing in this module reads the environment except
//! [`BackendConfig::from_env`]; everything else is plain values handed to
//! constructors, so stages can be built in tests without touching the
//! process environment.

use crate::{error::Result, PipelineError};
use std::fmt;
use std::str::FromStr;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default name of the environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for LLM requests.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Request JSON-object output from the model.
    pub json_mode: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            json_mode: false,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }
}

/// Model family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    Gpt4o,
    Gpt4,
    Gpt35,
    O1,
    Claude,
    Gemini,
    Llama,
    Unknown,
}

impl ModelFamily {
    fn tag(self) -> &'static str {
        match self {
            ModelFamily::Gpt4o => "gpt-4o",
            ModelFamily::Gpt4 => "gpt-4",
            ModelFamily::Gpt35 => "gpt-35",
            ModelFamily::O1 => "o1",
            ModelFamily::Claude => "claude",
            ModelFamily::Gemini => "gemini",
            ModelFamily::Llama => "llama",
            ModelFamily::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ModelFamily {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let family = match s.trim().to_ascii_lowercase().as_str() {
            "gpt-4o" => ModelFamily::Gpt4o,
            "gpt-4" => ModelFamily::Gpt4,
            "gpt-35" | "gpt-3.5" => ModelFamily::Gpt35,
            "o1" => ModelFamily::O1,
            "claude" => ModelFamily::Claude,
            "gemini" => ModelFamily::Gemini,
            "llama" => ModelFamily::Llama,
            "unknown" => ModelFamily::Unknown,
            other => {
                return Err(PipelineError::Configuration(format!(
                    "unknown model family '{}'",
                    other
                )))
            }
        };
        Ok(family)
    }
}

/// What the configured model can do.
///
/// Must describe the model accurately: stage construction refuses settings
/// the model cannot honour (e.g. JSON mode without `json_output`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub vision: bool,
    pub function_calling: bool,
    pub json_output: bool,
    pub structured_output: bool,
    pub family: ModelFamily,
}

impl ModelCapabilities {
    /// Known profile for common model identifiers, `None` for anything else.
    ///
    /// ```
    /// use research_pipeline::config::{ModelCapabilities, ModelFamily};
    ///
    /// let caps = ModelCapabilities::for_model("gpt-4o").unwrap();
    /// assert_eq!(caps.family, ModelFamily::Gpt4o);
    /// assert!(ModelCapabilities::for_model("my-local-model").is_none());
    /// ```
    pub fn for_model(model: &str) -> Option<Self> {
        let caps = match model {
            "gpt-4o" | "gpt-4o-mini" => Self {
                vision: true,
                function_calling: true,
                json_output: true,
                structured_output: true,
                family: ModelFamily::Gpt4o,
            },
            "gpt-4-turbo" => Self {
                vision: true,
                function_calling: true,
                json_output: true,
                structured_output: false,
                family: ModelFamily::Gpt4,
            },
            "gpt-3.5-turbo" => Self {
                vision: false,
                function_calling: true,
                json_output: true,
                structured_output: false,
                family: ModelFamily::Gpt35,
            },
            "o1" => Self {
                vision: true,
                function_calling: true,
                json_output: true,
                structured_output: true,
                family: ModelFamily::O1,
            },
            _ => return None,
        };
        Some(caps)
    }

    /// Plain-text model: no vision, tools, or JSON guarantees.
    pub fn text_only(family: ModelFamily) -> Self {
        Self {
            vision: false,
            function_calling: false,
            json_output: false,
            structured_output: false,
            family,
        }
    }
}

/// Where and how to reach the generative completion provider.
#[derive(Clone)]
pub struct BackendConfig {
    base_url: String,
    model: String,
    api_key: String,
    capabilities: ModelCapabilities,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Show a short key prefix for identification, never the whole secret.
pub(crate) fn redact(key: &str) -> String {
    match key.get(..6) {
        Some(prefix) if key.len() > 6 => format!("{}***", prefix),
        _ => "***".to_string(),
    }
}

impl BackendConfig {
    /// Build and validate a backend configuration.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        capabilities: ModelCapabilities,
    ) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let model = model.into().trim().to_string();
        let api_key = api_key.into().trim().to_string();

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(PipelineError::Configuration(format!(
                "base URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }
        if model.is_empty() {
            return Err(PipelineError::Configuration(
                "model identifier must not be empty".to_string(),
            ));
        }
        if api_key.is_empty() {
            return Err(PipelineError::Configuration(
                "API key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            model,
            api_key,
            capabilities,
        })
    }

    /// Like [`new`](Self::new), reading the API key from the environment variable `key_var`.
    ///
    /// Fails with [`PipelineError::Configuration`] naming the variable when it
    /// is unset or blank, before any network activity.
    pub fn from_env(
        key_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
        capabilities: ModelCapabilities,
    ) -> Result<Self> {
        let key = std::env::var(key_var).unwrap_or_default();
        if key.trim().is_empty() {
            return Err(PipelineError::Configuration(format!(
                "{} not found in environment; set it in your shell or .env file",
                key_var
            )));
        }
        Self::new(base_url, model, key, capabilities)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }
}
