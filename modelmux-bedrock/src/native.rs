use modelmux_provider::{CallOptions, Context, Error, HttpRequest, Model};
use serde_json::{json, Map, Value};

/// Anthropic-on-Bedrock body version marker; replaces the
/// `anthropic-version` header of the direct API.
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Build a native Anthropic invoke request. The body is the Messages
/// body minus `model` and `stream` (both live in the URL), plus the
/// Bedrock version marker.
pub fn build_invoke_request(
    runtime_url: &str,
    model: &Model,
    context: &Context,
    options: &CallOptions,
) -> Result<HttpRequest, Error> {
    let (system, messages) = modelmux_anthropic::chat::convert_messages(context)?;

    let mut body = Map::new();
    body.insert(
        "anthropic_version".to_string(),
        json!(BEDROCK_ANTHROPIC_VERSION),
    );
    body.insert(
        "max_tokens".to_string(),
        json!(modelmux_anthropic::chat::resolve_max_tokens(model, options)),
    );
    if let Some(system) = system {
        body.insert("system".to_string(), json!(system));
    }
    body.insert("messages".to_string(), Value::Array(messages));

    for key in ["temperature", "top_p", "top_k", "stop_sequences", "thinking"] {
        if let Some(value) = options.get(key) {
            body.insert(key.to_string(), value.clone());
        }
    }

    if !options.tools.is_empty() {
        let tools: Vec<Value> = options
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "input_schema": tool.to_json_schema(),
                })
            })
            .collect();
        body.insert("tools".to_string(), Value::Array(tools));
    }

    let operation = if options.stream() {
        "invoke-with-response-stream"
    } else {
        "invoke"
    };

    Ok(HttpRequest::post(
        format!("{runtime_url}/model/{}/{operation}", model.model),
        Value::Object(body),
    ))
}
