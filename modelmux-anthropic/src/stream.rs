use crate::chat::{decode_usage, map_stop_reason};
use modelmux_provider::{FrameEvent, Model, StreamChunk, Usage};
use serde_json::{json, Value};

/// Decode one Messages API stream event into canonical chunks.
///
/// Dispatches on the event `type`. Tool-use argument fragments carry the
/// content block index in chunk metadata; the id and name arrive on the
/// opening `content_block_start` only.
pub fn decode_event(event: &FrameEvent, _model: &Model) -> Vec<StreamChunk> {
    let Some(body) = event.as_json() else {
        return Vec::new();
    };

    match body["type"].as_str() {
        Some("content_block_start") => {
            let block = &body["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                let index = body["index"].as_u64().unwrap_or(0);
                let mut chunk = StreamChunk::tool_call(
                    block["id"].as_str().unwrap_or_default(),
                    block["name"].as_str().map(str::to_string),
                    "",
                );
                if let StreamChunk::ToolCall { metadata, .. } = &mut chunk {
                    metadata.insert("index".to_string(), json!(index));
                }
                return vec![chunk];
            }
            Vec::new()
        }

        Some("content_block_delta") => {
            let index = body["index"].as_u64().unwrap_or(0);
            let delta = &body["delta"];
            match delta["type"].as_str() {
                Some("text_delta") => delta["text"]
                    .as_str()
                    .filter(|text| !text.is_empty())
                    .map(StreamChunk::content)
                    .into_iter()
                    .collect(),
                Some("thinking_delta") => delta["thinking"]
                    .as_str()
                    .filter(|text| !text.is_empty())
                    .map(StreamChunk::reasoning)
                    .into_iter()
                    .collect(),
                Some("input_json_delta") => {
                    let mut chunk = StreamChunk::tool_call(
                        "",
                        None,
                        delta["partial_json"].as_str().unwrap_or_default(),
                    );
                    if let StreamChunk::ToolCall { metadata, .. } = &mut chunk {
                        metadata.insert("index".to_string(), json!(index));
                    }
                    vec![chunk]
                }
                _ => Vec::new(),
            }
        }

        Some("message_start") => {
            // Input token counts arrive up front on message_start.
            let usage = body["message"]
                .get("usage")
                .map(decode_usage)
                .unwrap_or_default();
            if usage == Usage::default() {
                Vec::new()
            } else {
                vec![StreamChunk::meta(usage, None)]
            }
        }

        Some("message_delta") => {
            let usage = body.get("usage").map(decode_usage).unwrap_or_default();
            let finish_reason = map_stop_reason(body["delta"]["stop_reason"].as_str());
            vec![StreamChunk::meta(usage, finish_reason)]
        }

        // message_stop carries nothing; ping and unknown events are noise.
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelmux_provider::FinishReason;

    fn model() -> Model {
        Model::new("anthropic", "claude-3-haiku-20240307")
    }

    fn event(value: Value) -> FrameEvent {
        FrameEvent::json(value)
    }

    #[test]
    fn text_delta_becomes_content() {
        let chunks = decode_event(
            &event(json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "text_delta", "text": "hello"}
            })),
            &model(),
        );
        assert_eq!(chunks, vec![StreamChunk::content("hello")]);
    }

    #[test]
    fn thinking_delta_becomes_reasoning() {
        let chunks = decode_event(
            &event(json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "thinking_delta", "thinking": "hmm"}
            })),
            &model(),
        );
        assert_eq!(chunks, vec![StreamChunk::reasoning("hmm")]);
    }

    #[test]
    fn tool_use_start_then_json_deltas() {
        let start = decode_event(
            &event(json!({
                "type": "content_block_start",
                "index": 1,
                "content_block": {"type": "tool_use", "id": "toolu_1", "name": "get_weather"}
            })),
            &model(),
        );
        match &start[0] {
            StreamChunk::ToolCall { id, name, arguments, metadata } => {
                assert_eq!(id, "toolu_1");
                assert_eq!(name.as_deref(), Some("get_weather"));
                assert!(arguments.is_empty());
                assert_eq!(metadata["index"], 1);
            }
            other => panic!("unexpected chunk: {other:?}"),
        }

        let delta = decode_event(
            &event(json!({
                "type": "content_block_delta",
                "index": 1,
                "delta": {"type": "input_json_delta", "partial_json": "{\"city\":"}
            })),
            &model(),
        );
        match &delta[0] {
            StreamChunk::ToolCall { arguments, metadata, .. } => {
                assert_eq!(arguments, "{\"city\":");
                assert_eq!(metadata["index"], 1);
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn message_delta_carries_meta() {
        let chunks = decode_event(
            &event(json!({
                "type": "message_delta",
                "delta": {"stop_reason": "end_turn"},
                "usage": {"output_tokens": 25}
            })),
            &model(),
        );
        match &chunks[0] {
            StreamChunk::Meta { usage, finish_reason, .. } => {
                assert_eq!(usage.output_tokens, 25);
                assert_eq!(*finish_reason, Some(FinishReason::Stop));
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn message_start_surfaces_input_tokens() {
        let chunks = decode_event(
            &event(json!({
                "type": "message_start",
                "message": {"usage": {"input_tokens": 17, "output_tokens": 0}}
            })),
            &model(),
        );
        match &chunks[0] {
            StreamChunk::Meta { usage, .. } => assert_eq!(usage.input_tokens, 17),
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn message_stop_and_ping_yield_nothing() {
        assert!(decode_event(&event(json!({"type": "message_stop"})), &model()).is_empty());
        assert!(decode_event(&event(json!({"type": "ping"})), &model()).is_empty());
        assert!(decode_event(&FrameEvent::text("[DONE]"), &model()).is_empty());
    }
}
