//! OpenAI-compatible chat adapter family.
//!
//! One adapter covers every provider speaking the Chat Completions wire
//! shape; constructors configure the base URL, env key, and per-provider
//! option quirks for OpenAI, Groq, xAI, and OpenRouter.

mod chat;
mod embedding;
mod stream;
mod translate;

use modelmux_provider::{
    CallOptions, Context, EmbedInput, EmbedResponse, Error, FrameEvent, Framing, GenerateResponse,
    HttpRequest, Model, Operation, ProviderAdapter, StreamChunk,
};
use serde_json::Value;

/// Which provider of the family this adapter instance speaks to. Quirk
/// translation and native-schema support branch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Groq,
    Xai,
    OpenRouter,
}

/// Adapter for providers speaking the OpenAI Chat Completions shape.
pub struct OpenAiCompatibleAdapter {
    id: String,
    base_url: String,
    env_key: String,
    kind: ProviderKind,
}

impl OpenAiCompatibleAdapter {
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        env_key: impl Into<String>,
        kind: ProviderKind,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            env_key: env_key.into(),
            kind,
        }
    }

    pub fn openai() -> Self {
        Self::new(
            "openai",
            "https://api.openai.com/v1",
            "OPENAI_API_KEY",
            ProviderKind::OpenAi,
        )
    }

    pub fn groq() -> Self {
        Self::new(
            "groq",
            "https://api.groq.com/openai/v1",
            "GROQ_API_KEY",
            ProviderKind::Groq,
        )
    }

    pub fn xai() -> Self {
        Self::new("xai", "https://api.x.ai/v1", "XAI_API_KEY", ProviderKind::Xai)
    }

    pub fn openrouter() -> Self {
        Self::new(
            "openrouter",
            "https://openrouter.ai/api/v1",
            "OPENROUTER_API_KEY",
            ProviderKind::OpenRouter,
        )
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }
}

impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn default_env_key(&self) -> Option<&str> {
        Some(&self.env_key)
    }

    fn supported_operations(&self) -> &[Operation] {
        &[Operation::Chat, Operation::Embedding]
    }

    fn supports_native_json_schema(&self, model: &Model) -> bool {
        match self.kind {
            ProviderKind::OpenAi => true,
            ProviderKind::Xai => model.model.starts_with("grok-4"),
            ProviderKind::Groq | ProviderKind::OpenRouter => false,
        }
    }

    fn translate_options(
        &self,
        operation: Operation,
        model: &Model,
        options: CallOptions,
    ) -> Result<(CallOptions, Vec<String>), Error> {
        translate::translate(self.kind, operation, model, options)
    }

    fn build_request(
        &self,
        operation: Operation,
        model: &Model,
        context: &Context,
        options: &CallOptions,
    ) -> Result<HttpRequest, Error> {
        match operation {
            Operation::Chat => chat::build_chat_request(&self.base_url, model, context, options),
            Operation::Embedding => Err(Error::invalid_parameter(
                "embedding requests are built via build_embed_request",
            )),
        }
    }

    fn build_embed_request(
        &self,
        model: &Model,
        input: &EmbedInput,
        options: &CallOptions,
    ) -> Result<HttpRequest, Error> {
        embedding::build_embed_request(&self.base_url, model, input, options)
    }

    fn decode_response(&self, body: Value, model: &Model) -> Result<GenerateResponse, Error> {
        chat::decode_chat_response(body, model)
    }

    fn decode_embed_response(&self, body: Value, model: &Model) -> Result<EmbedResponse, Error> {
        embedding::decode_embed_response(body, model)
    }

    fn decode_stream_event(&self, event: &FrameEvent, model: &Model) -> Vec<StreamChunk> {
        stream::decode_delta_event(event, model)
    }

    fn framing(&self) -> Framing {
        Framing::Sse
    }

    fn attach_credentials(&self, request: &mut HttpRequest, api_key: &str) {
        request.set_header("authorization", format!("Bearer {api_key}"));
    }
}
