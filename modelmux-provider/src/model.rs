use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default number of retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Context and output token limits for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModelLimit {
    /// Maximum context window in tokens.
    #[serde(default)]
    pub context: u64,

    /// Maximum output tokens per generation.
    #[serde(default)]
    pub output: u64,
}

/// Input/output modalities supported by a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modalities {
    #[serde(default)]
    pub input: Vec<String>,
    #[serde(default)]
    pub output: Vec<String>,
}

impl Default for Modalities {
    fn default() -> Self {
        Self {
            input: vec!["text".to_string()],
            output: vec!["text".to_string()],
        }
    }
}

/// Capability flags for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub reasoning: bool,
    #[serde(default)]
    pub tool_call: bool,
    #[serde(default = "default_true")]
    pub temperature: bool,
    #[serde(default)]
    pub attachment: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            reasoning: false,
            tool_call: false,
            temperature: true,
            attachment: false,
        }
    }
}

/// Per-token prices in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelCost {
    #[serde(default)]
    pub input: f64,
    #[serde(default)]
    pub output: f64,
}

/// A model identifier plus per-call runtime settings and, once joined
/// with the registry catalog, the model's static metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Provider id, e.g. `anthropic` or `openai`.
    pub provider: String,

    /// Provider-native model name, e.g. `claude-3-haiku-20240307`.
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Maximum retries for transient failures of non-streaming calls.
    pub max_retries: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<ModelLimit>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Modalities>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<ModelCost>,
}

impl Model {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            max_retries: DEFAULT_MAX_RETRIES,
            limit: None,
            modalities: None,
            capabilities: None,
            cost: None,
        }
    }

    /// Parse a `"provider:model"` spec string.
    ///
    /// The provider half must be non-empty and the model half must be a
    /// non-empty string; the model may itself contain `:` (Bedrock ids
    /// like `anthropic.claude-3-5-sonnet-20240620-v1:0` do).
    pub fn parse(spec: &str) -> Result<Self, Error> {
        let (provider, model) = spec
            .split_once(':')
            .ok_or_else(|| Error::invalid_model_spec(spec))?;

        if provider.is_empty() || model.is_empty() {
            return Err(Error::invalid_model_spec(spec));
        }

        Ok(Self::new(provider, model))
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Modalities with the boundary default applied: text in, text out.
    pub fn modalities_or_default(&self) -> Modalities {
        self.modalities.clone().unwrap_or_default()
    }

    /// Capabilities with the boundary default applied: everything off
    /// except temperature.
    pub fn capabilities_or_default(&self) -> Capabilities {
        self.capabilities.unwrap_or_default()
    }
}

impl FromStr for Model {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_and_model() {
        let model = Model::parse("anthropic:claude-3-haiku-20240307").unwrap();
        assert_eq!(model.provider, "anthropic");
        assert_eq!(model.model, "claude-3-haiku-20240307");
        assert_eq!(model.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(model.temperature, None);
    }

    #[test]
    fn model_half_may_contain_colons() {
        let model = Model::parse("bedrock:anthropic.claude-3-5-sonnet-20240620-v1:0").unwrap();
        assert_eq!(model.provider, "bedrock");
        assert_eq!(model.model, "anthropic.claude-3-5-sonnet-20240620-v1:0");
    }

    #[test]
    fn rejects_missing_separator() {
        let err = Model::parse("invalid").unwrap_err();
        assert!(matches!(err, Error::InvalidModelSpec { spec } if spec == "invalid"));
    }

    #[test]
    fn rejects_empty_halves() {
        assert!(Model::parse(":gpt-4o").is_err());
        assert!(Model::parse("openai:").is_err());
        assert!(Model::parse(":").is_err());
    }

    #[test]
    fn from_str_round_trip() {
        let model: Model = "groq:llama-3.3-70b-versatile".parse().unwrap();
        assert_eq!(model.provider, "groq");
    }

    #[test]
    fn boundary_defaults() {
        let model = Model::new("openai", "gpt-4o");
        let modalities = model.modalities_or_default();
        assert_eq!(modalities.input, vec!["text"]);
        assert_eq!(modalities.output, vec!["text"]);

        let caps = model.capabilities_or_default();
        assert!(caps.temperature);
        assert!(!caps.reasoning);
        assert!(!caps.tool_call);
        assert!(!caps.attachment);
    }

    #[test]
    fn builder_settings() {
        let model = Model::new("openai", "gpt-4o")
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_max_retries(0);
        assert_eq!(model.temperature, Some(0.2));
        assert_eq!(model.max_tokens, Some(512));
        assert_eq!(model.max_retries, 0);
    }
}
