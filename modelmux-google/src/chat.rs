use modelmux_provider::{
    CallOptions, ContentPart, Context, Error, FinishReason, GenerateResponse, HttpRequest, Message,
    Model, Role, ToolChoice, Usage,
};
use serde_json::{json, Map, Value};

/// Build a `generateContent` (or `streamGenerateContent`) request.
pub fn build_generate_request(
    base_url: &str,
    model: &Model,
    context: &Context,
    options: &CallOptions,
) -> Result<HttpRequest, Error> {
    context.validate()?;

    let mut body = Map::new();

    if let Some(system) = context.system_message() {
        body.insert(
            "systemInstruction".to_string(),
            json!({"parts": [{"text": system.content.text()}]}),
        );
    }

    let contents: Result<Vec<Value>, Error> = context
        .non_system_messages()
        .map(convert_message)
        .collect();
    body.insert("contents".to_string(), Value::Array(contents?));

    let generation_config = build_generation_config(options);
    if !generation_config.is_empty() {
        body.insert("generationConfig".to_string(), Value::Object(generation_config));
    }

    if let Some(safety) = options.get("safety_settings") {
        body.insert("safetySettings".to_string(), safety.clone());
    }

    if !options.tools.is_empty() {
        let declarations: Vec<Value> = options
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.to_json_schema(),
                })
            })
            .collect();
        body.insert(
            "tools".to_string(),
            json!([{"functionDeclarations": declarations}]),
        );
    }

    if let Some(choice) = &options.tool_choice {
        body.insert("toolConfig".to_string(), encode_tool_config(choice));
    }

    let operation = if options.stream() {
        "streamGenerateContent"
    } else {
        "generateContent"
    };
    let query = if options.stream() { "?alt=sse" } else { "" };

    let mut request = HttpRequest::post(
        format!("{base_url}/models/{}:{operation}{query}", model.model),
        Value::Object(body),
    );
    if options.stream() {
        request.set_header("accept", "text/event-stream");
    }

    Ok(request)
}

/// Sampling controls nest under `generationConfig` with camelCase names.
fn build_generation_config(options: &CallOptions) -> Map<String, Value> {
    let mut config = Map::new();
    let renames = [
        ("temperature", "temperature"),
        ("max_tokens", "maxOutputTokens"),
        ("top_p", "topP"),
        ("top_k", "topK"),
        ("stop_sequences", "stopSequences"),
        ("candidate_count", "candidateCount"),
        ("thinking_config", "thinkingConfig"),
    ];
    for (from, to) in renames {
        if let Some(value) = options.get(from) {
            config.insert(to.to_string(), value.clone());
        }
    }

    if let Some(format) = options.response_format() {
        // Native JSON-schema mode: responseSchema plus a JSON mime type.
        if let Some(schema) = format.get("json_schema").and_then(|js| js.get("schema")) {
            config.insert("responseMimeType".to_string(), json!("application/json"));
            config.insert("responseSchema".to_string(), schema.clone());
        }
    }

    config
}

fn encode_tool_config(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({"functionCallingConfig": {"mode": "AUTO"}}),
        ToolChoice::None => json!({"functionCallingConfig": {"mode": "NONE"}}),
        ToolChoice::Required => json!({"functionCallingConfig": {"mode": "ANY"}}),
        ToolChoice::Tool(name) => json!({
            "functionCallingConfig": {"mode": "ANY", "allowedFunctionNames": [name]}
        }),
    }
}

fn convert_message(message: &Message) -> Result<Value, Error> {
    let role = match message.role {
        Role::Assistant => "model",
        Role::User | Role::Tool => "user",
        Role::System => unreachable!("system messages are lifted into systemInstruction"),
    };

    let mut parts = Vec::new();

    if message.role == Role::Tool {
        let name = message
            .metadata
            .get("tool_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let content = message.content.text();
        let response: Value =
            serde_json::from_str(&content).unwrap_or_else(|_| json!({"result": content}));
        parts.push(json!({
            "functionResponse": {"name": name, "response": response}
        }));
    } else {
        for part in message.content.as_parts() {
            parts.push(convert_part(&part)?);
        }
        if let Some(tool_calls) = &message.tool_calls {
            for part in tool_calls {
                parts.push(convert_part(part)?);
            }
        }
    }

    Ok(json!({"role": role, "parts": parts}))
}

fn convert_part(part: &ContentPart) -> Result<Value, Error> {
    match part {
        ContentPart::Text { text, .. } => Ok(json!({"text": text})),
        ContentPart::Reasoning { text, .. } => Ok(json!({"text": text, "thought": true})),
        ContentPart::Image { data, media_type, .. } => Ok(json!({
            "inlineData": {"mimeType": media_type, "data": data}
        })),
        ContentPart::ImageUrl { url, .. } => Ok(json!({
            "fileData": {"fileUri": url}
        })),
        ContentPart::File { data, media_type, .. } => Ok(json!({
            "inlineData": {"mimeType": media_type, "data": data}
        })),
        ContentPart::ToolCall { name, arguments, .. } => Ok(json!({
            "functionCall": {"name": name, "args": arguments}
        })),
        ContentPart::ToolResult { content, .. } => Ok(json!({
            "functionResponse": {"name": "", "response": content}
        })),
    }
}

/// Gemini finish reasons onto the canonical enum. Tool use is detected
/// via parts, not the finish reason.
pub fn map_finish_reason(reason: Option<&str>, has_tool_calls: bool) -> Option<FinishReason> {
    if has_tool_calls {
        return Some(FinishReason::ToolCalls);
    }
    reason.map(|reason| match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    })
}

pub fn decode_usage(usage: &Value) -> Usage {
    let input_tokens = usage["promptTokenCount"].as_u64().unwrap_or(0);
    let output_tokens = usage["candidatesTokenCount"].as_u64().unwrap_or(0);
    Usage {
        input_tokens,
        output_tokens,
        total_tokens: usage["totalTokenCount"]
            .as_u64()
            .unwrap_or(input_tokens + output_tokens),
        reasoning_tokens: usage["thoughtsTokenCount"].as_u64().unwrap_or(0),
        cached_tokens: usage["cachedContentTokenCount"].as_u64().unwrap_or(0),
    }
}

/// Pull canonical parts out of one candidate's content parts.
pub fn decode_parts(parts: &[Value]) -> (Vec<ContentPart>, Vec<ContentPart>) {
    let mut content = Vec::new();
    let mut tool_calls = Vec::new();

    for part in parts {
        if let Some(text) = part["text"].as_str() {
            if part["thought"].as_bool().unwrap_or(false) {
                content.push(ContentPart::reasoning(text));
            } else {
                content.push(ContentPart::text(text));
            }
        } else if let Some(call) = part.get("functionCall") {
            let name = call["name"].as_str().unwrap_or_default();
            tool_calls.push(ContentPart::tool_call(
                format!("call_{}", uuid::Uuid::new_v4()),
                name,
                call.get("args").cloned().unwrap_or_else(|| json!({})),
            ));
        }
    }

    (content, tool_calls)
}

pub fn decode_generate_response(body: Value, model: &Model) -> Result<GenerateResponse, Error> {
    let obj = match body.as_object() {
        Some(obj) => obj,
        None => {
            return Err(Error::not_implemented(
                "expected a JSON object response body",
            ))
        }
    };

    let candidate = obj
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| Error::parse("response has no candidates", Some(body.to_string())))?;

    let empty = Vec::new();
    let parts = candidate["content"]["parts"].as_array().unwrap_or(&empty);
    let (content, tool_calls) = decode_parts(parts);

    let mut message = Message::assistant(content);
    let has_tool_calls = !tool_calls.is_empty();
    if has_tool_calls {
        message = message.with_tool_calls(tool_calls);
    }

    let finish_reason =
        map_finish_reason(candidate["finishReason"].as_str(), has_tool_calls);
    let usage = obj
        .get("usageMetadata")
        .map(decode_usage)
        .unwrap_or_default();

    let mut provider_meta = Map::new();
    for (key, value) in obj {
        if !matches!(key.as_str(), "candidates" | "usageMetadata") {
            provider_meta.insert(key.clone(), value.clone());
        }
    }

    Ok(GenerateResponse {
        id: obj
            .get("responseId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("gen_{}", uuid::Uuid::new_v4())),
        model: obj
            .get("modelVersion")
            .and_then(Value::as_str)
            .unwrap_or(&model.model)
            .to_string(),
        context: Context::new(),
        message,
        usage,
        finish_reason,
        provider_meta,
        warnings: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model::new("google", "gemini-2.0-flash")
    }

    #[test]
    fn contents_use_model_role_for_assistant() {
        let context = Context::new()
            .with_system("be brief")
            .with_user("hi")
            .with_assistant("hello");
        let request =
            build_generate_request("https://g", &model(), &context, &CallOptions::new()).unwrap();

        assert_eq!(
            request.body["systemInstruction"]["parts"][0]["text"],
            "be brief"
        );
        assert_eq!(request.body["contents"][0]["role"], "user");
        assert_eq!(request.body["contents"][1]["role"], "model");
    }

    #[test]
    fn generation_config_nests_camel_case() {
        let options = CallOptions::new()
            .with_temperature(0.4)
            .with_max_tokens(256)
            .with("top_k", json!(40));
        let context = Context::new().with_user("hi");
        let request = build_generate_request("https://g", &model(), &context, &options).unwrap();

        let config = &request.body["generationConfig"];
        assert_eq!(config["temperature"], 0.4);
        assert_eq!(config["maxOutputTokens"], 256);
        assert_eq!(config["topK"], 40);
    }

    #[test]
    fn streaming_switches_operation_and_adds_alt_sse() {
        let context = Context::new().with_user("hi");
        let request = build_generate_request(
            "https://g",
            &model(),
            &context,
            &CallOptions::new().with_stream(true),
        )
        .unwrap();
        assert!(request
            .url
            .ends_with("/models/gemini-2.0-flash:streamGenerateContent?alt=sse"));
    }

    #[test]
    fn tool_results_become_function_responses() {
        let mut tool_message = Message::tool("call_1", "{\"temp\": 12}");
        tool_message
            .metadata
            .insert("tool_name".to_string(), json!("get_weather"));
        let context = Context::new().with_user("weather?").with_message(tool_message);

        let request =
            build_generate_request("https://g", &model(), &context, &CallOptions::new()).unwrap();
        let part = &request.body["contents"][1]["parts"][0];
        assert_eq!(part["functionResponse"]["name"], "get_weather");
        assert_eq!(part["functionResponse"]["response"]["temp"], 12);
    }

    #[test]
    fn finish_reason_table() {
        assert_eq!(map_finish_reason(Some("STOP"), false), Some(FinishReason::Stop));
        assert_eq!(
            map_finish_reason(Some("MAX_TOKENS"), false),
            Some(FinishReason::Length)
        );
        assert_eq!(
            map_finish_reason(Some("SAFETY"), false),
            Some(FinishReason::ContentFilter)
        );
        assert_eq!(
            map_finish_reason(Some("RECITATION"), false),
            Some(FinishReason::Other("RECITATION".to_string()))
        );
        // Tool use wins over the provider reason.
        assert_eq!(
            map_finish_reason(Some("STOP"), true),
            Some(FinishReason::ToolCalls)
        );
        assert_eq!(map_finish_reason(None, false), None);
    }

    #[test]
    fn decodes_function_call_response() {
        let body = json!({
            "responseId": "resp_1",
            "modelVersion": "gemini-2.0-flash-001",
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "Let me check."},
                    {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 4, "totalTokenCount": 12}
        });

        let response = decode_generate_response(body, &model()).unwrap();
        assert_eq!(response.id, "resp_1");
        assert_eq!(response.model, "gemini-2.0-flash-001");
        assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(response.usage.total(), 12);
        assert_eq!(response.tool_calls().len(), 1);
    }

    #[test]
    fn thought_parts_decode_as_reasoning() {
        let (content, _) = decode_parts(&[
            json!({"text": "thinking...", "thought": true}),
            json!({"text": "Answer"}),
        ]);
        assert_eq!(content[0].as_reasoning(), Some("thinking..."));
        assert_eq!(content[1].as_text(), Some("Answer"));
    }
}
