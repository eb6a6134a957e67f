//! Google Gemini adapter (`generateContent` API).

pub mod chat;
pub mod stream;
mod translate;

use modelmux_provider::{
    CallOptions, Context, EmbedInput, EmbedResponse, Error, FrameEvent, Framing, GenerateResponse,
    HttpRequest, Model, Operation, ProviderAdapter, StreamChunk,
};
use serde_json::{json, Value};

/// Adapter for the Gemini `generateContent` family of endpoints.
pub struct GoogleAdapter {
    base_url: String,
}

impl GoogleAdapter {
    pub fn new() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for GoogleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderAdapter for GoogleAdapter {
    fn provider_id(&self) -> &str {
        "google"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn default_env_key(&self) -> Option<&str> {
        Some("GEMINI_API_KEY")
    }

    fn supported_operations(&self) -> &[Operation] {
        &[Operation::Chat, Operation::Embedding]
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
            Operation::Chat => chat::build_generate_request(&self.base_url, model, context, options),
            Operation::Embedding => Err(Error::invalid_parameter(
                "embedding requests are built via build_embed_request",
            )),
        }
    }

    fn build_embed_request(
        &self,
        model: &Model,
        input: &EmbedInput,
        _options: &CallOptions,
    ) -> Result<HttpRequest, Error> {
        if input.is_empty() {
            return Err(Error::invalid_parameter("embedding input must be non-empty"));
        }

        let texts: Vec<&str> = match input {
            EmbedInput::Text(text) => vec![text.as_str()],
            EmbedInput::Batch(items) => items.iter().map(String::as_str).collect(),
        };

        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{}", model.model),
                    "content": {"parts": [{"text": text}]},
                })
            })
            .collect();

        Ok(HttpRequest::post(
            format!(
                "{}/models/{}:batchEmbedContents",
                self.base_url, model.model
            ),
            json!({"requests": requests}),
        ))
    }

    fn decode_response(&self, body: Value, model: &Model) -> Result<GenerateResponse, Error> {
        chat::decode_generate_response(body, model)
    }

    fn decode_embed_response(&self, body: Value, model: &Model) -> Result<EmbedResponse, Error> {
        let embeddings = body
            .get("embeddings")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::parse("embedding response has no embeddings array", Some(body.to_string()))
            })?
            .iter()
            .map(|entry| {
                entry["values"]
                    .as_array()
                    .map(|values| values.iter().filter_map(Value::as_f64).collect())
                    .ok_or_else(|| Error::parse("embedding entry has no values array", None))
            })
            .collect::<Result<Vec<Vec<f64>>, Error>>()?;

        Ok(EmbedResponse {
            embeddings,
            model: model.model.clone(),
            usage: Default::default(),
        })
    }

    fn decode_stream_event(&self, event: &FrameEvent, model: &Model) -> Vec<StreamChunk> {
        stream::decode_event(event, model)
    }

    fn framing(&self) -> Framing {
        Framing::SseOrJsonArray
    }

    fn attach_credentials(&self, request: &mut HttpRequest, api_key: &str) {
        request.set_header("x-goog-api-key", api_key.to_string());
    }
}
