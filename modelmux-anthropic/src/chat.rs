use crate::ANTHROPIC_VERSION;
use modelmux_provider::{
    CallOptions, ContentPart, Context, Error, FinishReason, GenerateResponse, HttpRequest, Message,
    Model, Role, ToolChoice, Usage,
};
use serde_json::{json, Map, Value};

const DEFAULT_MAX_TOKENS: u64 = 4096;

/// The Messages API requires `max_tokens`; fall back to the catalog
/// output limit, then a fixed default.
pub fn resolve_max_tokens(model: &Model, options: &CallOptions) -> u64 {
    options
        .max_tokens()
        .or(model.max_tokens.map(u64::from))
        .or(model.limit.map(|l| l.output).filter(|o| *o > 0))
        .unwrap_or(DEFAULT_MAX_TOKENS)
}

/// Convert the canonical context into the `system` string plus the
/// Messages API message array. Content is always a block array; tool
/// results ride in user-role messages.
pub fn convert_messages(context: &Context) -> Result<(Option<String>, Vec<Value>), Error> {
    context.validate()?;

    let system = context.system_message().map(|m| m.content.text());

    let mut messages = Vec::new();
    for message in context.non_system_messages() {
        messages.push(convert_message(message)?);
    }

    Ok((system, messages))
}

fn convert_message(message: &Message) -> Result<Value, Error> {
    match message.role {
        Role::System => unreachable!("system messages are lifted into the system field"),
        Role::User => Ok(json!({
            "role": "user",
            "content": convert_parts(&message.content.as_parts())?,
        })),
        Role::Assistant => {
            let mut blocks = convert_parts(&message.content.as_parts())?;
            if let Some(tool_calls) = &message.tool_calls {
                for part in tool_calls {
                    blocks.push(convert_part(part)?);
                }
            }
            Ok(json!({"role": "assistant", "content": blocks}))
        }
        Role::Tool => {
            let tool_call_id = message
                .tool_call_id
                .as_ref()
                .ok_or_else(|| Error::invalid_message("tool-role message requires tool_call_id"))?;
            Ok(json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": message.content.text(),
                }],
            }))
        }
    }
}

fn convert_parts(parts: &[ContentPart]) -> Result<Vec<Value>, Error> {
    parts.iter().map(convert_part).collect()
}

fn convert_part(part: &ContentPart) -> Result<Value, Error> {
    match part {
        ContentPart::Text { text, .. } => Ok(json!({"type": "text", "text": text})),
        ContentPart::Reasoning { text, metadata } => {
            let mut block = Map::new();
            block.insert("type".to_string(), json!("thinking"));
            block.insert("thinking".to_string(), json!(text));
            // Round-tripping thinking blocks requires the signature the
            // provider attached to them.
            if let Some(signature) = metadata.get("signature") {
                block.insert("signature".to_string(), signature.clone());
            }
            Ok(Value::Object(block))
        }
        ContentPart::Image { data, media_type, .. } => Ok(json!({
            "type": "image",
            "source": {"type": "base64", "media_type": media_type, "data": data},
        })),
        ContentPart::ImageUrl { url, .. } => Ok(json!({
            "type": "image",
            "source": {"type": "url", "url": url},
        })),
        ContentPart::File { data, media_type, .. } => Ok(json!({
            "type": "document",
            "source": {"type": "base64", "media_type": media_type, "data": data},
        })),
        ContentPart::ToolCall { id, name, arguments, .. } => Ok(json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": arguments,
        })),
        ContentPart::ToolResult { tool_call_id, content, .. } => Ok(json!({
            "type": "tool_result",
            "tool_use_id": tool_call_id,
            "content": content,
        })),
    }
}

fn encode_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({"type": "auto"}),
        ToolChoice::None => json!({"type": "none"}),
        ToolChoice::Required => json!({"type": "any"}),
        ToolChoice::Tool(name) => json!({"type": "tool", "name": name}),
    }
}

pub fn build_messages_request(
    base_url: &str,
    model: &Model,
    context: &Context,
    options: &CallOptions,
) -> Result<HttpRequest, Error> {
    let (system, messages) = convert_messages(context)?;

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model.model));
    body.insert("max_tokens".to_string(), json!(resolve_max_tokens(model, options)));
    if let Some(system) = system {
        body.insert("system".to_string(), json!(system));
    }
    body.insert("messages".to_string(), Value::Array(messages));

    for (key, value) in options.body_entries() {
        if key != "max_tokens" {
            body.insert(key.clone(), value.clone());
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

    if let Some(choice) = &options.tool_choice {
        body.insert("tool_choice".to_string(), encode_tool_choice(choice));
    }

    if options.stream() {
        body.insert("stream".to_string(), json!(true));
    }

    let mut request = HttpRequest::post(format!("{base_url}/v1/messages"), Value::Object(body))
        .header("anthropic-version", ANTHROPIC_VERSION);
    if options.stream() {
        request.set_header("accept", "text/event-stream");
    }

    Ok(request)
}

/// Map an Anthropic stop reason onto the canonical enum.
pub fn map_stop_reason(stop_reason: Option<&str>) -> Option<FinishReason> {
    stop_reason.map(|reason| match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        other => FinishReason::Other(other.to_string()),
    })
}

pub fn decode_usage(usage: &Value) -> Usage {
    let input_tokens = usage["input_tokens"].as_u64().unwrap_or(0);
    let output_tokens = usage["output_tokens"].as_u64().unwrap_or(0);
    Usage {
        input_tokens,
        output_tokens,
        total_tokens: input_tokens + output_tokens,
        reasoning_tokens: 0,
        cached_tokens: usage["cache_read_input_tokens"].as_u64().unwrap_or(0),
    }
}

pub fn decode_messages_response(body: Value, model: &Model) -> Result<GenerateResponse, Error> {
    let obj = match body.as_object() {
        Some(obj) => obj,
        None => {
            return Err(Error::not_implemented(
                "expected a JSON object response body",
            ))
        }
    };

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("msg_{}", uuid::Uuid::new_v4()));

    let returned_model = obj
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(&model.model)
        .to_string();

    let blocks = obj
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::parse("response has no content blocks", Some(body.to_string())))?;

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(text) = block["text"].as_str() {
                    parts.push(ContentPart::text(text));
                }
            }
            Some("thinking") => {
                if let Some(thinking) = block["thinking"].as_str() {
                    let mut part = ContentPart::reasoning(thinking);
                    if let (ContentPart::Reasoning { metadata, .. }, Some(signature)) =
                        (&mut part, block.get("signature"))
                    {
                        metadata.insert("signature".to_string(), signature.clone());
                    }
                    parts.push(part);
                }
            }
            Some("tool_use") => {
                tool_calls.push(ContentPart::tool_call(
                    block["id"].as_str().unwrap_or_default(),
                    block["name"].as_str().unwrap_or_default(),
                    block.get("input").cloned().unwrap_or_else(|| json!({})),
                ));
            }
            _ => {}
        }
    }

    let mut message = Message::assistant(parts);
    if !tool_calls.is_empty() {
        message = message.with_tool_calls(tool_calls);
    }

    let usage = obj.get("usage").map(decode_usage).unwrap_or_default();
    let finish_reason = map_stop_reason(obj.get("stop_reason").and_then(Value::as_str));

    let mut provider_meta = Map::new();
    for (key, value) in obj {
        if !matches!(key.as_str(), "id" | "model" | "content" | "usage" | "stop_reason") {
            provider_meta.insert(key.clone(), value.clone());
        }
    }

    Ok(GenerateResponse {
        id,
        model: returned_model,
        context: Context::new(),
        message,
        usage,
        finish_reason,
        provider_meta,
        warnings: Vec::new(),
    })
}
