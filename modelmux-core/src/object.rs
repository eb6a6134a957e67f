//! Structured-output engine.
//!
//! Drives JSON-schema-constrained generation either through a provider's
//! native `response_format` support or by synthesizing a single forced
//! tool call and extracting the object from its arguments.

use crate::stream::StreamResponse;
use modelmux_provider::{
    CallOptions, ContentPart, Error, GenerateResponse, Model, ProviderAdapter, StreamChunk,
    StreamMetadata, Tool, ToolChoice,
};
use serde_json::{json, Value};
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

/// Name of the synthesized tool in fallback mode.
pub const STRUCTURED_OUTPUT_TOOL: &str = "structured_output";

/// How schema-constrained generation is driven for one (provider, model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStrategy {
    /// The provider accepts a `json_schema` response format.
    NativeJsonSchema,
    /// A single `structured_output` tool is forced and the object is the
    /// tool call's arguments.
    ToolFallback,
}

pub(crate) fn choose_strategy(adapter: &dyn ProviderAdapter, model: &Model) -> ObjectStrategy {
    if adapter.supports_native_json_schema(model) {
        ObjectStrategy::NativeJsonSchema
    } else {
        ObjectStrategy::ToolFallback
    }
}

/// Reject schemas the engine cannot enforce before any request is made.
pub(crate) fn check_schema(schema: &Value) -> Result<(), Error> {
    jsonschema::validator_for(schema)
        .map(|_| ())
        .map_err(|err| Error::invalid_schema(err.to_string()))
}

/// Wire the chosen strategy into the call options.
pub(crate) fn apply_strategy(
    options: &mut CallOptions,
    schema: &Value,
    strategy: ObjectStrategy,
) -> Result<(), Error> {
    match strategy {
        ObjectStrategy::NativeJsonSchema => {
            options.set(
                "response_format",
                json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": STRUCTURED_OUTPUT_TOOL,
                        "schema": schema,
                        "strict": true,
                    }
                }),
            );
        }
        ObjectStrategy::ToolFallback => {
            let tool = Tool::from_json_schema(
                STRUCTURED_OUTPUT_TOOL,
                "Return the structured output matching the schema.",
                schema.clone(),
            )?;
            options.tools = vec![tool];
            options.tool_choice = Some(ToolChoice::Tool(STRUCTURED_OUTPUT_TOOL.to_string()));
        }
    }
    Ok(())
}

/// Pull the generated object out of a completed response.
pub(crate) fn extract_object(
    response: &GenerateResponse,
    strategy: ObjectStrategy,
) -> Result<Value, Error> {
    match strategy {
        ObjectStrategy::NativeJsonSchema => {
            let text = response.text();
            serde_json::from_str(&text)
                .map_err(|err| Error::schema_validation(err.to_string(), Some(text)))
        }
        ObjectStrategy::ToolFallback => response
            .tool_calls()
            .iter()
            .find_map(|part| match part {
                ContentPart::ToolCall { name, arguments, .. }
                    if name == STRUCTURED_OUTPUT_TOOL =>
                {
                    Some(arguments.clone())
                }
                _ => None,
            })
            .ok_or_else(|| {
                Error::schema_validation(
                    "model did not produce a structured_output tool call",
                    Some(response.text()),
                )
            }),
    }
}

/// Validate an extracted object against the schema.
pub(crate) fn validate_object(object: &Value, schema: &Value) -> Result<(), Error> {
    let validator =
        jsonschema::validator_for(schema).map_err(|err| Error::invalid_schema(err.to_string()))?;

    validator
        .validate(object)
        .map_err(|err| Error::schema_validation(err.to_string(), Some(object.to_string())))
}

/// A completed structured-output generation.
#[derive(Debug, Clone)]
pub struct ObjectResponse {
    pub response: GenerateResponse,
    pub object: Value,
}

/// A streaming structured-output generation.
///
/// Forwards the underlying chunks (tool-argument fragments included) and
/// assembles + validates the object on termination.
pub struct ObjectStream {
    inner: StreamResponse,
    schema: Value,
    strategy: ObjectStrategy,
}

impl ObjectStream {
    pub(crate) fn new(inner: StreamResponse, schema: Value, strategy: ObjectStrategy) -> Self {
        Self {
            inner,
            schema,
            strategy,
        }
    }

    pub async fn next_chunk(&mut self) -> Option<Result<StreamChunk, Error>> {
        self.inner.next_chunk().await
    }

    pub async fn metadata(&mut self) -> StreamMetadata {
        self.inner.metadata().await
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Exhaust the stream, assemble the object, and validate it.
    pub async fn object(self) -> Result<ObjectResponse, Error> {
        let response = self.inner.join().await?;
        let object = extract_object(&response, self.strategy)?;
        validate_object(&object, &self.schema)?;
        Ok(ObjectResponse { response, object })
    }
}

impl futures_util::Stream for ObjectStream {
    type Item = Result<StreamChunk, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
