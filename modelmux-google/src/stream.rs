use crate::chat::{decode_parts, decode_usage, map_finish_reason};
use modelmux_provider::{ContentPart, FrameEvent, Model, StreamChunk};
use serde_json::Value;

/// Decode one Gemini stream event. Events are whole `generateContent`
/// response objects; parts map to content/reasoning/tool-call chunks and
/// `usageMetadata` to a meta chunk.
pub fn decode_event(event: &FrameEvent, _model: &Model) -> Vec<StreamChunk> {
    let Some(body) = event.as_json() else {
        return Vec::new();
    };

    let mut chunks = Vec::new();

    let candidate = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first());

    let mut has_tool_calls = false;
    let mut finish = None;

    if let Some(candidate) = candidate {
        let empty = Vec::new();
        let parts = candidate["content"]["parts"].as_array().unwrap_or(&empty);
        let (content, tool_calls) = decode_parts(parts);

        for part in content {
            match part {
                ContentPart::Text { text, .. } => chunks.push(StreamChunk::content(text)),
                ContentPart::Reasoning { text, .. } => chunks.push(StreamChunk::reasoning(text)),
                _ => {}
            }
        }

        for call in tool_calls {
            if let ContentPart::ToolCall { id, name, arguments, .. } = call {
                chunks.push(StreamChunk::tool_call(
                    id,
                    Some(name),
                    arguments.to_string(),
                ));
            }
        }

        has_tool_calls = chunks
            .iter()
            .any(|c| matches!(c, StreamChunk::ToolCall { .. }));
        finish = candidate["finishReason"].as_str().map(str::to_string);
    }

    // The trailing event carries usageMetadata alongside (or without) a
    // final candidate.
    if let Some(usage) = body.get("usageMetadata").filter(|u| u.is_object()) {
        chunks.push(StreamChunk::meta(
            decode_usage(usage),
            map_finish_reason(finish.as_deref(), has_tool_calls),
        ));
    } else if let Some(reason) = finish {
        chunks.push(StreamChunk::meta(
            Default::default(),
            map_finish_reason(Some(&reason), has_tool_calls),
        ));
    }

    chunks
}
