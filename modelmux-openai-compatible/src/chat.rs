use modelmux_provider::{
    CallOptions, ContentPart, Context, Error, FinishReason, GenerateResponse, HttpRequest, Message,
    MessageContent, Model, Role, ToolChoice, Usage,
};
use serde_json::{json, Map, Value};

/// Build a Chat Completions request body from the canonical context.
pub fn build_chat_request(
    base_url: &str,
    model: &Model,
    context: &Context,
    options: &CallOptions,
) -> Result<HttpRequest, Error> {
    context.validate()?;

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model.model));
    body.insert(
        "messages".to_string(),
        Value::Array(convert_messages(context)?),
    );

    for (key, value) in options.body_entries() {
        body.insert(key.clone(), value.clone());
    }

    if !options.tools.is_empty() {
        let tools: Vec<Value> = options
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.to_json_schema(),
                    }
                })
            })
            .collect();
        body.insert("tools".to_string(), Value::Array(tools));
    }

    if let Some(choice) = &options.tool_choice {
        body.insert("tool_choice".to_string(), encode_tool_choice(choice));
    }

    if let Some(format) = options.response_format() {
        body.insert("response_format".to_string(), format.clone());
    }

    if options.stream() {
        body.insert("stream".to_string(), json!(true));
        // Without this the final frame carries no usage at all.
        body.insert("stream_options".to_string(), json!({"include_usage": true}));
    }

    let mut request = HttpRequest::post(format!("{base_url}/chat/completions"), Value::Object(body));
    if options.stream() {
        request.set_header("accept", "text/event-stream");
    }

    Ok(request)
}

fn encode_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Tool(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

fn convert_messages(context: &Context) -> Result<Vec<Value>, Error> {
    context.iter().map(convert_message).collect()
}

fn convert_message(message: &Message) -> Result<Value, Error> {
    match message.role {
        Role::System => Ok(json!({"role": "system", "content": message.content.text()})),
        Role::User => {
            let content = convert_user_content(&message.content)?;
            Ok(json!({"role": "user", "content": content}))
        }
        Role::Assistant => convert_assistant_message(message),
        Role::Tool => {
            let tool_call_id = message
                .tool_call_id
                .as_ref()
                .ok_or_else(|| Error::invalid_message("tool-role message requires tool_call_id"))?;
            Ok(json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": message.content.text(),
            }))
        }
    }
}

/// Single text parts flatten to a plain string; anything else becomes a
/// typed part array.
fn convert_user_content(content: &MessageContent) -> Result<Value, Error> {
    match content {
        MessageContent::Text(text) => Ok(json!(text)),
        MessageContent::Parts(parts) => {
            if let [ContentPart::Text { text, .. }] = parts.as_slice() {
                return Ok(json!(text));
            }

            let converted: Result<Vec<Value>, Error> = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text, .. } => Ok(json!({"type": "text", "text": text})),
                    ContentPart::ImageUrl { url, .. } => {
                        Ok(json!({"type": "image_url", "image_url": {"url": url}}))
                    }
                    ContentPart::Image { data, media_type, .. } => Ok(json!({
                        "type": "image_url",
                        "image_url": {"url": format!("data:{media_type};base64,{data}")}
                    })),
                    ContentPart::File { .. } => Err(Error::not_implemented(
                        "file parts are not supported by chat completions",
                    )),
                    other => Err(Error::invalid_message(format!(
                        "unsupported user content part: {other:?}"
                    ))),
                })
                .collect();

            Ok(Value::Array(converted?))
        }
    }
}

fn convert_assistant_message(message: &Message) -> Result<Value, Error> {
    let mut out = Map::new();
    out.insert("role".to_string(), json!("assistant"));

    let text = message.content.text();
    if !text.is_empty() {
        out.insert("content".to_string(), json!(text));
    } else {
        out.insert("content".to_string(), Value::Null);
    }

    let tool_calls: Vec<Value> = message
        .tool_call_parts()
        .iter()
        .filter_map(|part| match part {
            ContentPart::ToolCall { id, name, arguments, .. } => Some(json!({
                "id": id,
                "type": "function",
                "function": {
                    "name": name,
                    "arguments": arguments.to_string(),
                }
            })),
            _ => None,
        })
        .collect();

    if !tool_calls.is_empty() {
        out.insert("tool_calls".to_string(), Value::Array(tool_calls));
    }

    Ok(Value::Object(out))
}

/// Map a Chat Completions finish reason onto the canonical enum; unknown
/// non-null strings are preserved, missing stays `None`.
pub fn map_finish_reason(finish_reason: Option<&str>) -> Option<FinishReason> {
    finish_reason.map(|reason| match reason {
        "stop" | "stop_sequence" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    })
}

pub fn decode_usage(usage: &Value) -> Usage {
    let mut out = Usage {
        input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
        total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
        reasoning_tokens: usage["completion_tokens_details"]["reasoning_tokens"]
            .as_u64()
            .unwrap_or(0),
        cached_tokens: usage["prompt_tokens_details"]["cached_tokens"]
            .as_u64()
            .unwrap_or(0),
    };
    if out.total_tokens == 0 {
        out.total_tokens = out.input_tokens + out.output_tokens;
    }
    out
}

/// Decode a non-streaming Chat Completions response.
pub fn decode_chat_response(body: Value, model: &Model) -> Result<GenerateResponse, Error> {
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
        .unwrap_or_else(|| format!("gen_{}", uuid::Uuid::new_v4()));

    let returned_model = obj
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(&model.model)
        .to_string();

    let choice = obj
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| Error::parse("response has no choices", Some(body.to_string())))?;

    let message_obj = &choice["message"];
    let mut parts: Vec<ContentPart> = Vec::new();

    // Reasoning precedes content in the canonical part order.
    for key in ["reasoning", "reasoning_content"] {
        if let Some(reasoning) = message_obj.get(key).and_then(Value::as_str) {
            if !reasoning.is_empty() {
                parts.push(ContentPart::reasoning(reasoning));
                break;
            }
        }
    }

    if let Some(text) = message_obj.get("content").and_then(Value::as_str) {
        if !text.is_empty() {
            parts.push(ContentPart::text(text));
        }
    }

    let tool_calls = decode_tool_calls(message_obj.get("tool_calls"));
    let mut message = Message::assistant(parts);
    if !tool_calls.is_empty() {
        message = message.with_tool_calls(tool_calls);
    }

    let usage = obj.get("usage").map(decode_usage).unwrap_or_default();
    let finish_reason = map_finish_reason(choice.get("finish_reason").and_then(Value::as_str));

    let mut provider_meta = Map::new();
    for (key, value) in obj {
        if !matches!(key.as_str(), "id" | "model" | "choices" | "usage") {
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

/// Tool calls whose argument JSON fails to parse are dropped; null
/// arguments become `{}`.
fn decode_tool_calls(tool_calls: Option<&Value>) -> Vec<ContentPart> {
    let Some(calls) = tool_calls.and_then(Value::as_array) else {
        return Vec::new();
    };

    calls
        .iter()
        .filter_map(|call| {
            let id = call["id"].as_str().unwrap_or_default().to_string();
            let name = call["function"]["name"].as_str()?.to_string();
            let arguments = match call["function"].get("arguments") {
                None | Some(Value::Null) => json!({}),
                Some(Value::String(raw)) => serde_json::from_str(raw).ok()?,
                Some(other) => other.clone(),
            };
            Some(ContentPart::tool_call(id, name, arguments))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelmux_provider::Tool;

    fn model() -> Model {
        Model::new("openai", "gpt-4o")
    }

    #[test]
    fn single_text_part_flattens_to_string() {
        let context = Context::new().with_user(vec![ContentPart::text("hello")]);
        let request = build_chat_request("https://api.openai.com/v1", &model(), &context, &CallOptions::new()).unwrap();
        assert_eq!(request.body["messages"][0]["content"], "hello");
    }

    #[test]
    fn multi_part_user_content_becomes_array() {
        let context = Context::new().with_user(vec![
            ContentPart::text("what is this?"),
            ContentPart::image_url("https://example.com/cat.png"),
        ]);
        let request = build_chat_request("https://api.openai.com/v1", &model(), &context, &CallOptions::new()).unwrap();
        let content = &request.body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["image_url"]["url"], "https://example.com/cat.png");
    }

    #[test]
    fn inline_images_become_data_urls() {
        let context = Context::new().with_user(vec![
            ContentPart::text("describe"),
            ContentPart::image("aGVsbG8=", "image/png"),
        ]);
        let request = build_chat_request("https://api.openai.com/v1", &model(), &context, &CallOptions::new()).unwrap();
        assert_eq!(
            request.body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,aGVsbG8="
        );
    }

    #[test]
    fn assistant_tool_calls_use_json_string_arguments() {
        let call = ContentPart::tool_call("call_1", "get_weather", json!({"city": "Paris"}));
        let context = Context::new()
            .with_user("weather?")
            .with_message(Message::assistant(vec![call]))
            .with_message(Message::tool("call_1", "{\"temp\": 12}"));

        let request = build_chat_request("https://api.openai.com/v1", &model(), &context, &CallOptions::new()).unwrap();
        let assistant = &request.body["messages"][1];
        assert_eq!(assistant["tool_calls"][0]["id"], "call_1");
        assert_eq!(assistant["tool_calls"][0]["type"], "function");
        assert_eq!(
            assistant["tool_calls"][0]["function"]["arguments"],
            "{\"city\":\"Paris\"}"
        );

        let tool = &request.body["messages"][2];
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["tool_call_id"], "call_1");
    }

    #[test]
    fn tools_render_with_schemas() {
        let tool = Tool::new(
            "get_weather",
            "Weather lookup",
            modelmux_provider::ParameterSchema::new().with_param(
                "city",
                modelmux_provider::ParameterSpec::new("string").required(),
            ),
        )
        .unwrap();
        let options = CallOptions::new()
            .with_tools(vec![tool])
            .with_tool_choice(ToolChoice::Tool("get_weather".to_string()));
        let context = Context::new().with_user("weather?");

        let request = build_chat_request("https://api.openai.com/v1", &model(), &context, &options).unwrap();
        assert_eq!(request.body["tools"][0]["function"]["name"], "get_weather");
        assert_eq!(
            request.body["tool_choice"]["function"]["name"],
            "get_weather"
        );
    }

    #[test]
    fn streaming_adds_flags_and_accept_header() {
        let context = Context::new().with_user("hi");
        let options = CallOptions::new().with_stream(true);
        let request = build_chat_request("https://api.openai.com/v1", &model(), &context, &options).unwrap();
        assert_eq!(request.body["stream"], true);
        assert_eq!(request.body["stream_options"]["include_usage"], true);
        assert_eq!(request.header_value("accept"), Some("text/event-stream"));
    }

    #[test]
    fn finish_reason_table() {
        assert_eq!(map_finish_reason(Some("stop")), Some(FinishReason::Stop));
        assert_eq!(map_finish_reason(Some("length")), Some(FinishReason::Length));
        assert_eq!(
            map_finish_reason(Some("tool_calls")),
            Some(FinishReason::ToolCalls)
        );
        assert_eq!(
            map_finish_reason(Some("content_filter")),
            Some(FinishReason::ContentFilter)
        );
        assert_eq!(
            map_finish_reason(Some("weird")),
            Some(FinishReason::Other("weird".to_string()))
        );
        assert_eq!(map_finish_reason(None), None);
    }

    #[test]
    fn decodes_simple_response() {
        let body = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-2024-08-06",
            "created": 1700000000,
            "choices": [{
                "message": {"role": "assistant", "content": "Hello!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        });

        let response = decode_chat_response(body, &model()).unwrap();
        assert_eq!(response.id, "chatcmpl-1");
        assert_eq!(response.model, "gpt-4o-2024-08-06");
        assert_eq!(response.text(), "Hello!");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.total(), 15);
        // Unconsumed top-level keys survive in provider_meta.
        assert_eq!(response.provider_meta["created"], 1700000000);
    }

    #[test]
    fn missing_usage_defaults_to_zero() {
        let body = json!({
            "choices": [{"message": {"content": "x"}}]
        });
        let response = decode_chat_response(body, &model()).unwrap();
        assert_eq!(response.usage, Usage::default());
        assert_eq!(response.finish_reason, None);
        assert!(response.id.starts_with("gen_"));
    }

    #[test]
    fn unparseable_tool_arguments_drop_the_call() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "function": {"name": "bad", "arguments": "{not json"}},
                        {"id": "b", "function": {"name": "good", "arguments": "{\"x\":1}"}},
                        {"id": "c", "function": {"name": "nil", "arguments": null}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        });

        let response = decode_chat_response(body, &model()).unwrap();
        let calls = response.tool_calls();
        assert_eq!(calls.len(), 2);
        match calls[0] {
            ContentPart::ToolCall { name, arguments, .. } => {
                assert_eq!(name, "good");
                assert_eq!(arguments, &json!({"x": 1}));
            }
            other => panic!("unexpected part: {other:?}"),
        }
        match calls[1] {
            ContentPart::ToolCall { name, arguments, .. } => {
                assert_eq!(name, "nil");
                assert_eq!(arguments, &json!({}));
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn non_object_body_is_not_implemented() {
        let err = decode_chat_response(json!("nope"), &model()).unwrap_err();
        assert!(matches!(err, Error::NotImplemented { .. }));
    }

    #[test]
    fn reasoning_part_precedes_content() {
        let body = json!({
            "choices": [{
                "message": {"content": "Hello", "reasoning_content": "I should greet"},
                "finish_reason": "stop"
            }]
        });
        let response = decode_chat_response(body, &model()).unwrap();
        let parts = response.message.content.as_parts();
        assert_eq!(parts[0].as_reasoning(), Some("I should greet"));
        assert_eq!(parts[1].as_text(), Some("Hello"));
    }

    #[test]
    fn echoed_context_round_trips_roles_and_text() {
        let context = Context::new()
            .with_system("be brief")
            .with_user("ping")
            .with_assistant("pong")
            .with_user("again");
        let request = build_chat_request("https://api.openai.com/v1", &model(), &context, &CallOptions::new()).unwrap();

        // Simulate a provider echoing the last user message back.
        let echoed = request.body["messages"][3]["content"].clone();
        let body = json!({
            "choices": [{"message": {"content": echoed}, "finish_reason": "stop"}]
        });
        let response = decode_chat_response(body, &model()).unwrap();
        assert_eq!(response.text(), "again");
        assert_eq!(response.message.role, Role::Assistant);
    }
}
