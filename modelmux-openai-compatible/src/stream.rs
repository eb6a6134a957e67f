use crate::chat::{decode_usage, map_finish_reason};
use modelmux_provider::{FrameEvent, Model, StreamChunk};
use serde_json::{json, Value};

/// Decode one Chat Completions streaming frame into canonical chunks.
///
/// `choices[0].delta` carries content, reasoning, and tool-call argument
/// fragments. Deltas after the first for a tool call omit the id, so
/// every tool-call chunk records the delta index in its metadata and the
/// accumulating side keys fragments by index.
pub fn decode_delta_event(event: &FrameEvent, _model: &Model) -> Vec<StreamChunk> {
    if event.is_done_sentinel() {
        return Vec::new();
    }

    let Some(body) = event.as_json() else {
        return Vec::new();
    };

    let mut chunks = Vec::new();

    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first());

    if let Some(choice) = choice {
        let delta = &choice["delta"];

        for key in ["reasoning", "reasoning_content"] {
            if let Some(text) = delta.get(key).and_then(Value::as_str) {
                if !text.is_empty() {
                    chunks.push(StreamChunk::reasoning(text));
                }
                break;
            }
        }

        if let Some(text) = delta.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                chunks.push(StreamChunk::content(text));
            }
        }

        if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for call in tool_calls {
                let index = call["index"].as_u64().unwrap_or(0);
                let id = call["id"].as_str().unwrap_or_default();
                let name = call["function"]["name"].as_str().map(str::to_string);
                let arguments = call["function"]["arguments"].as_str().unwrap_or_default();

                let mut chunk = StreamChunk::tool_call(id, name, arguments);
                if let StreamChunk::ToolCall { metadata, .. } = &mut chunk {
                    metadata.insert("index".to_string(), json!(index));
                }
                chunks.push(chunk);
            }
        }

        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            let usage = body.get("usage").map(decode_usage).unwrap_or_default();
            chunks.push(StreamChunk::meta(usage, map_finish_reason(Some(reason))));
        }
    }

    // The final frame often carries usage with an empty choices array.
    if choice.is_none() {
        if let Some(usage) = body.get("usage").filter(|u| u.is_object()) {
            chunks.push(StreamChunk::meta(decode_usage(usage), None));
        }
    }

    chunks
}
