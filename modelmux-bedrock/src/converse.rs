use modelmux_provider::{
    CallOptions, ContentPart, Context, Error, FinishReason, FrameEvent, GenerateResponse,
    HttpRequest, Message, Model, Role, StreamChunk, ToolChoice, Usage,
};
use serde_json::{json, Map, Value};

/// Build a Converse (or `converse-stream`) request.
pub fn build_converse_request(
    runtime_url: &str,
    model: &Model,
    context: &Context,
    options: &CallOptions,
) -> Result<HttpRequest, Error> {
    context.validate()?;

    let mut body = Map::new();

    if let Some(system) = context.system_message() {
        body.insert(
            "system".to_string(),
            json!([{"text": system.content.text()}]),
        );
    }

    let messages: Result<Vec<Value>, Error> = context
        .non_system_messages()
        .map(convert_message)
        .collect();
    body.insert("messages".to_string(), Value::Array(messages?));

    let mut inference = Map::new();
    if let Some(max_tokens) = options.max_tokens().or(model.max_tokens.map(u64::from)) {
        inference.insert("maxTokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = options.temperature() {
        inference.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(top_p) = options.top_p() {
        inference.insert("topP".to_string(), json!(top_p));
    }
    if let Some(stop) = options.get("stop_sequences") {
        inference.insert("stopSequences".to_string(), stop.clone());
    }
    if !inference.is_empty() {
        body.insert("inferenceConfig".to_string(), Value::Object(inference));
    }

    if !options.tools.is_empty() {
        let tools: Vec<Value> = options
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "toolSpec": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "inputSchema": {"json": tool.to_json_schema()},
                    }
                })
            })
            .collect();

        let mut tool_config = Map::new();
        tool_config.insert("tools".to_string(), Value::Array(tools));
        if let Some(choice) = &options.tool_choice {
            if let Some(encoded) = encode_tool_choice(choice) {
                tool_config.insert("toolChoice".to_string(), encoded);
            }
        }
        body.insert("toolConfig".to_string(), Value::Object(tool_config));
    }

    let operation = if options.stream() {
        "converse-stream"
    } else {
        "converse"
    };

    Ok(HttpRequest::post(
        format!("{runtime_url}/model/{}/{operation}", model.model),
        Value::Object(body),
    ))
}

/// Converse has no "none" choice; omitting toolChoice is the closest.
fn encode_tool_choice(choice: &ToolChoice) -> Option<Value> {
    match choice {
        ToolChoice::Auto => Some(json!({"auto": {}})),
        ToolChoice::Required => Some(json!({"any": {}})),
        ToolChoice::Tool(name) => Some(json!({"tool": {"name": name}})),
        ToolChoice::None => None,
    }
}

fn convert_message(message: &Message) -> Result<Value, Error> {
    match message.role {
        Role::System => unreachable!("system messages are lifted into the system field"),
        Role::User => {
            let blocks: Result<Vec<Value>, Error> = message
                .content
                .as_parts()
                .iter()
                .map(convert_part)
                .collect();
            Ok(json!({"role": "user", "content": blocks?}))
        }
        Role::Assistant => {
            let mut blocks: Vec<Value> = message
                .content
                .as_parts()
                .iter()
                .map(convert_part)
                .collect::<Result<_, _>>()?;
            if let Some(tool_calls) = &message.tool_calls {
                for part in tool_calls {
                    blocks.push(convert_part(part)?);
                }
            }
            Ok(json!({"role": "assistant", "content": blocks}))
        }
        // Tool results ride in user-role messages as toolResult blocks.
        Role::Tool => {
            let tool_call_id = message
                .tool_call_id
                .as_ref()
                .ok_or_else(|| Error::invalid_message("tool-role message requires tool_call_id"))?;
            Ok(json!({
                "role": "user",
                "content": [{
                    "toolResult": {
                        "toolUseId": tool_call_id,
                        "content": [{"text": message.content.text()}],
                    }
                }],
            }))
        }
    }
}

fn convert_part(part: &ContentPart) -> Result<Value, Error> {
    match part {
        ContentPart::Text { text, .. } => Ok(json!({"text": text})),
        ContentPart::Reasoning { text, .. } => Ok(json!({
            "reasoningContent": {"reasoningText": {"text": text}}
        })),
        ContentPart::Image { data, media_type, .. } => {
            let format = media_type.strip_prefix("image/").unwrap_or("png");
            Ok(json!({"image": {"format": format, "source": {"bytes": data}}}))
        }
        ContentPart::ToolCall { id, name, arguments, .. } => Ok(json!({
            "toolUse": {"toolUseId": id, "name": name, "input": arguments}
        })),
        ContentPart::ToolResult { tool_call_id, content, .. } => Ok(json!({
            "toolResult": {"toolUseId": tool_call_id, "content": [{"json": content}]}
        })),
        other => Err(Error::invalid_message(format!(
            "unsupported content part for Converse: {other:?}"
        ))),
    }
}

pub fn map_stop_reason(reason: Option<&str>) -> Option<FinishReason> {
    reason.map(|reason| match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "content_filtered" | "guardrail_intervened" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    })
}

pub fn decode_usage(usage: &Value) -> Usage {
    let input_tokens = usage["inputTokens"].as_u64().unwrap_or(0);
    let output_tokens = usage["outputTokens"].as_u64().unwrap_or(0);
    Usage {
        input_tokens,
        output_tokens,
        total_tokens: usage["totalTokens"]
            .as_u64()
            .unwrap_or(input_tokens + output_tokens),
        reasoning_tokens: 0,
        cached_tokens: usage["cacheReadInputTokens"].as_u64().unwrap_or(0),
    }
}

pub fn decode_converse_response(body: Value, model: &Model) -> Result<GenerateResponse, Error> {
    let obj = match body.as_object() {
        Some(obj) => obj,
        None => {
            return Err(Error::not_implemented(
                "expected a JSON object response body",
            ))
        }
    };

    let blocks = obj
        .get("output")
        .and_then(|o| o.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .ok_or_else(|| Error::parse("response has no output message", Some(body.to_string())))?;

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        if let Some(text) = block["text"].as_str() {
            parts.push(ContentPart::text(text));
        } else if let Some(reasoning) = block["reasoningContent"]["reasoningText"]["text"].as_str() {
            parts.push(ContentPart::reasoning(reasoning));
        } else if let Some(tool_use) = block.get("toolUse") {
            tool_calls.push(ContentPart::tool_call(
                tool_use["toolUseId"].as_str().unwrap_or_default(),
                tool_use["name"].as_str().unwrap_or_default(),
                tool_use.get("input").cloned().unwrap_or_else(|| json!({})),
            ));
        }
    }

    let mut message = Message::assistant(parts);
    if !tool_calls.is_empty() {
        message = message.with_tool_calls(tool_calls);
    }

    let mut provider_meta = Map::new();
    for (key, value) in obj {
        if !matches!(key.as_str(), "output" | "usage" | "stopReason") {
            provider_meta.insert(key.clone(), value.clone());
        }
    }

    Ok(GenerateResponse {
        id: format!("bedrock_{}", uuid::Uuid::new_v4()),
        model: model.model.clone(),
        context: Context::new(),
        message,
        usage: obj.get("usage").map(decode_usage).unwrap_or_default(),
        finish_reason: map_stop_reason(obj.get("stopReason").and_then(Value::as_str)),
        provider_meta,
        warnings: Vec::new(),
    })
}

/// Decode one Converse stream event. The event type arrives in the
/// frame's `:event-type` header; bodies are small camelCase objects.
pub fn decode_stream_event(event: &FrameEvent, _model: &Model) -> Vec<StreamChunk> {
    let Some(body) = event.as_json() else {
        return Vec::new();
    };

    match event.event.as_deref() {
        Some("contentBlockStart") => {
            let start = &body["start"];
            if let Some(tool_use) = start.get("toolUse") {
                let index = body["contentBlockIndex"].as_u64().unwrap_or(0);
                let mut chunk = StreamChunk::tool_call(
                    tool_use["toolUseId"].as_str().unwrap_or_default(),
                    tool_use["name"].as_str().map(str::to_string),
                    "",
                );
                if let StreamChunk::ToolCall { metadata, .. } = &mut chunk {
                    metadata.insert("index".to_string(), json!(index));
                }
                return vec![chunk];
            }
            Vec::new()
        }

        Some("contentBlockDelta") => {
            let delta = &body["delta"];
            if let Some(text) = delta["text"].as_str() {
                return vec![StreamChunk::content(text)];
            }
            if let Some(reasoning) = delta["reasoningContent"]["text"].as_str() {
                return vec![StreamChunk::reasoning(reasoning)];
            }
            if let Some(tool_input) = delta["toolUse"]["input"].as_str() {
                let index = body["contentBlockIndex"].as_u64().unwrap_or(0);
                let mut chunk = StreamChunk::tool_call("", None, tool_input);
                if let StreamChunk::ToolCall { metadata, .. } = &mut chunk {
                    metadata.insert("index".to_string(), json!(index));
                }
                return vec![chunk];
            }
            Vec::new()
        }

        Some("messageStop") => {
            vec![StreamChunk::meta(
                Usage::default(),
                map_stop_reason(body["stopReason"].as_str()),
            )]
        }

        Some("metadata") => body
            .get("usage")
            .map(|usage| vec![StreamChunk::meta(decode_usage(usage), None)])
            .unwrap_or_default(),

        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model::new("bedrock", "amazon.nova-pro-v1:0")
    }

    #[test]
    fn system_is_a_text_block_array() {
        let context = Context::new().with_system("rules").with_user("hi");
        let request = build_converse_request(
            "https://bedrock-runtime.us-east-1.amazonaws.com",
            &model(),
            &context,
            &CallOptions::new(),
        )
        .unwrap();
        assert_eq!(request.body["system"], json!([{"text": "rules"}]));
        assert!(request.url.ends_with("/model/amazon.nova-pro-v1:0/converse"));
    }

    #[test]
    fn tool_results_are_user_role_tool_result_blocks() {
        let context = Context::new()
            .with_user("weather?")
            .with_message(Message::assistant(vec![ContentPart::tool_call(
                "tooluse_1",
                "get_weather",
                json!({"city": "Paris"}),
            )]))
            .with_message(Message::tool("tooluse_1", "{\"temp\": 12}"));

        let request = build_converse_request(
            "https://bedrock-runtime.us-east-1.amazonaws.com",
            &model(),
            &context,
            &CallOptions::new(),
        )
        .unwrap();

        let assistant = &request.body["messages"][1];
        assert_eq!(assistant["content"][0]["toolUse"]["toolUseId"], "tooluse_1");

        let result = &request.body["messages"][2];
        assert_eq!(result["role"], "user");
        assert_eq!(
            result["content"][0]["toolResult"]["toolUseId"],
            "tooluse_1"
        );
    }

    #[test]
    fn inference_config_uses_camel_case() {
        let context = Context::new().with_user("hi");
        let options = CallOptions::new()
            .with_max_tokens(300)
            .with_temperature(0.5)
            .with("stop_sequences", json!(["END"]));
        let request = build_converse_request(
            "https://bedrock-runtime.us-east-1.amazonaws.com",
            &model(),
            &context,
            &options,
        )
        .unwrap();

        let config = &request.body["inferenceConfig"];
        assert_eq!(config["maxTokens"], 300);
        assert_eq!(config["temperature"], 0.5);
        assert_eq!(config["stopSequences"], json!(["END"]));
    }

    #[test]
    fn decodes_converse_response() {
        let body = json!({
            "output": {"message": {"role": "assistant", "content": [
                {"text": "Hi there"},
                {"toolUse": {"toolUseId": "t1", "name": "lookup", "input": {"q": "x"}}}
            ]}},
            "stopReason": "tool_use",
            "usage": {"inputTokens": 9, "outputTokens": 4, "totalTokens": 13}
        });

        let response = decode_converse_response(body, &model()).unwrap();
        assert_eq!(response.text(), "Hi there");
        assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(response.usage.total(), 13);
        assert_eq!(response.tool_calls().len(), 1);
    }

    #[test]
    fn stop_reason_table() {
        assert_eq!(map_stop_reason(Some("end_turn")), Some(FinishReason::Stop));
        assert_eq!(map_stop_reason(Some("max_tokens")), Some(FinishReason::Length));
        assert_eq!(
            map_stop_reason(Some("guardrail_intervened")),
            Some(FinishReason::ContentFilter)
        );
        assert_eq!(
            map_stop_reason(Some("odd")),
            Some(FinishReason::Other("odd".to_string()))
        );
    }

    #[test]
    fn stream_event_dispatch_uses_event_type_header() {
        let mut event = FrameEvent::json(json!({"delta": {"text": "hello"}}));
        event.event = Some("contentBlockDelta".to_string());
        assert_eq!(
            decode_stream_event(&event, &model()),
            vec![StreamChunk::content("hello")]
        );

        let mut event = FrameEvent::json(json!({"stopReason": "end_turn"}));
        event.event = Some("messageStop".to_string());
        match &decode_stream_event(&event, &model())[0] {
            StreamChunk::Meta { finish_reason, .. } => {
                assert_eq!(*finish_reason, Some(FinishReason::Stop))
            }
            other => panic!("unexpected chunk: {other:?}"),
        }

        let mut event = FrameEvent::json(json!({
            "usage": {"inputTokens": 3, "outputTokens": 5, "totalTokens": 8}
        }));
        event.event = Some("metadata".to_string());
        match &decode_stream_event(&event, &model())[0] {
            StreamChunk::Meta { usage, .. } => assert_eq!(usage.total_tokens, 8),
            other => panic!("unexpected chunk: {other:?}"),
        }
    }
}
