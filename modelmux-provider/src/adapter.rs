use crate::chunk::StreamChunk;
use crate::context::Context;
use crate::embedding::{EmbedInput, EmbedResponse};
use crate::error::Error;
use crate::model::Model;
use crate::options::CallOptions;
use crate::request::HttpRequest;
use crate::response::GenerateResponse;
use serde_json::Value;

/// Operations an adapter may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Chat,
    Embedding,
}

/// Transport framing used by a provider's streaming responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Text Server-Sent Events.
    Sse,
    /// Text SSE, falling back to a raw JSON array body when the stream
    /// begins with `[` (some Gemini configurations).
    SseOrJsonArray,
    /// AWS Event Stream binary framing.
    AwsEventStream,
}

/// One framed transport event, ready for an adapter's stream decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEvent {
    pub data: FrameData,
    pub event: Option<String>,
    pub id: Option<String>,
}

/// Event payload: JSON when the data decoded, raw text otherwise (so
/// sentinels like `[DONE]` survive framing).
#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    Json(Value),
    Text(String),
}

impl FrameEvent {
    pub fn json(value: Value) -> Self {
        Self {
            data: FrameData::Json(value),
            event: None,
            id: None,
        }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self {
            data: FrameData::Text(data.into()),
            event: None,
            id: None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match &self.data {
            FrameData::Json(value) => Some(value),
            FrameData::Text(_) => None,
        }
    }

    /// True for the `[DONE]` end-of-stream sentinel.
    pub fn is_done_sentinel(&self) -> bool {
        matches!(&self.data, FrameData::Text(text) if text.trim() == "[DONE]")
    }
}

/// The per-provider codec contract.
///
/// Adapters are pure translators between the canonical model and a
/// provider's wire format; all I/O (HTTP, retries, stream lifecycle)
/// lives in the runtime. Implementations must be cheap to call and
/// shareable across threads.
pub trait ProviderAdapter: Send + Sync {
    fn provider_id(&self) -> &str;

    fn base_url(&self) -> &str;

    /// Environment variable holding this provider's API key, when the
    /// adapter pins one. Registry falls back to catalog metadata and then
    /// the `UPPER(ID)_API_KEY` convention.
    fn default_env_key(&self) -> Option<&str> {
        None
    }

    fn supported_operations(&self) -> &[Operation] {
        &[Operation::Chat]
    }

    /// Whether the runtime should resolve an API key and attach it via
    /// [`attach_credentials`](Self::attach_credentials). Adapters that
    /// sign requests themselves (Bedrock) opt out.
    fn requires_api_key(&self) -> bool {
        true
    }

    /// Whether the provider accepts a JSON-schema response format
    /// natively for this model; otherwise the structured-output engine
    /// uses the tool-call fallback.
    fn supports_native_json_schema(&self, _model: &Model) -> bool {
        false
    }

    /// Validate and reshape caller options for this provider. Returns
    /// translated options plus human-readable warnings for dropped or
    /// rewritten settings. Warnings never fail the call.
    fn translate_options(
        &self,
        operation: Operation,
        model: &Model,
        options: CallOptions,
    ) -> Result<(CallOptions, Vec<String>), Error>;

    /// Encode the canonical context into a provider-native request.
    fn build_request(
        &self,
        operation: Operation,
        model: &Model,
        context: &Context,
        options: &CallOptions,
    ) -> Result<HttpRequest, Error>;

    /// Build an embedding request. Only called when
    /// [`supported_operations`](Self::supported_operations) includes
    /// [`Operation::Embedding`].
    fn build_embed_request(
        &self,
        _model: &Model,
        _input: &EmbedInput,
        _options: &CallOptions,
    ) -> Result<HttpRequest, Error> {
        Err(Error::not_implemented(format!(
            "provider {} does not support embeddings",
            self.provider_id()
        )))
    }

    /// Decode a provider's non-streaming response body.
    fn decode_response(&self, body: Value, model: &Model) -> Result<GenerateResponse, Error>;

    /// Decode a provider's embedding response body.
    fn decode_embed_response(&self, _body: Value, _model: &Model) -> Result<EmbedResponse, Error> {
        Err(Error::not_implemented(format!(
            "provider {} does not support embeddings",
            self.provider_id()
        )))
    }

    /// Decode one framed transport event into zero or more chunks.
    fn decode_stream_event(&self, event: &FrameEvent, model: &Model) -> Vec<StreamChunk>;

    /// Streaming transport framing for this provider.
    fn framing(&self) -> Framing {
        Framing::Sse
    }

    /// Attach a resolved credential to a built request.
    fn attach_credentials(&self, request: &mut HttpRequest, api_key: &str);
}
