//! Anthropic Messages API adapter.

pub mod chat;
pub mod stream;
mod translate;

use modelmux_provider::{
    CallOptions, Context, Error, FrameEvent, Framing, GenerateResponse, HttpRequest, Model,
    Operation, ProviderAdapter, StreamChunk,
};
use serde_json::Value;

/// Pinned API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Adapter for the Anthropic Messages API.
pub struct AnthropicAdapter {
    base_url: String,
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn default_env_key(&self) -> Option<&str> {
        Some("ANTHROPIC_API_KEY")
    }

    fn translate_options(
        &self,
        operation: Operation,
        model: &Model,
        options: CallOptions,
    ) -> Result<(CallOptions, Vec<String>), Error> {
        translate::translate(operation, model, options)
    }

    fn build_request(
        &self,
        operation: Operation,
        model: &Model,
        context: &Context,
        options: &CallOptions,
    ) -> Result<HttpRequest, Error> {
        match operation {
            Operation::Chat => chat::build_messages_request(&self.base_url, model, context, options),
            Operation::Embedding => Err(Error::not_implemented(
                "provider anthropic does not support embeddings",
            )),
        }
    }

    fn decode_response(&self, body: Value, model: &Model) -> Result<GenerateResponse, Error> {
        chat::decode_messages_response(body, model)
    }

    fn decode_stream_event(&self, event: &FrameEvent, model: &Model) -> Vec<StreamChunk> {
        stream::decode_event(event, model)
    }

    fn framing(&self) -> Framing {
        Framing::Sse
    }

    fn attach_credentials(&self, request: &mut HttpRequest, api_key: &str) {
        request.set_header("x-api-key", api_key.to_string());
    }
}
