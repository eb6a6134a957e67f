use modelmux_provider::{FrameData, FrameEvent};
use serde_json::Value;

/// Incremental text SSE parser.
///
/// Events are `field: value` line groups terminated by a blank line.
/// Recognized fields: `data`, `event`, `id`, `retry`. Multiple `data:`
/// lines concatenate with `\n`. After framing, each event's data is
/// JSON-decoded when possible and left as text otherwise, so sentinels
/// like `[DONE]` survive.
#[derive(Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns events completed by it. Any
    /// unterminated trailing bytes stay buffered.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = find_event_boundary(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end.block_end).collect();
            self.buffer.drain(..end.separator_len);
            if let Some(event) = parse_event_block(&block) {
                events.push(event);
            }
        }

        events
    }

    /// Bytes still waiting for an event terminator.
    pub fn remaining(&self) -> &[u8] {
        &self.buffer
    }
}

struct Boundary {
    block_end: usize,
    separator_len: usize,
}

/// Locate the first blank-line event terminator (`\n\n` or `\r\n\r\n`).
fn find_event_boundary(buffer: &[u8]) -> Option<Boundary> {
    let mut i = 0;
    while i < buffer.len() {
        if buffer[i] == b'\n' {
            if buffer.get(i + 1) == Some(&b'\n') {
                return Some(Boundary {
                    block_end: i + 1,
                    separator_len: 1,
                });
            }
            if buffer.get(i + 1) == Some(&b'\r') && buffer.get(i + 2) == Some(&b'\n') {
                return Some(Boundary {
                    block_end: i + 1,
                    separator_len: 2,
                });
            }
        }
        i += 1;
    }
    None
}

fn parse_event_block(block: &[u8]) -> Option<FrameEvent> {
    let text = String::from_utf8_lossy(block);

    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_name: Option<String> = None;
    let mut event_id: Option<String> = None;

    for raw_line in text.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => data_lines.push(value),
            "event" => event_name = Some(value.to_string()),
            "id" => event_id = Some(value.to_string()),
            // retry only adjusts client reconnect delay; an invalid
            // integer is ignored entirely.
            "retry" => {
                let _ = value.parse::<u64>();
            }
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    let data = data_lines.join("\n");
    let payload = match serde_json::from_str::<Value>(&data) {
        Ok(value) => FrameData::Json(value),
        Err(_) => FrameData::Text(data),
    };

    Some(FrameEvent {
        data: payload,
        event: event_name,
        id: event_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed_all(parser: &mut SseParser, input: &[u8]) -> Vec<FrameEvent> {
        parser.feed(input)
    }

    #[test]
    fn parses_single_event() {
        let mut parser = SseParser::new();
        let events = feed_all(&mut parser, b"data: {\"x\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_json(), Some(&json!({"x": 1})));
    }

    #[test]
    fn chunk_boundary_mid_event() {
        let full = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n";
        let (prefix, suffix) = full.split_at(17);

        let mut parser = SseParser::new();
        assert!(parser.feed(prefix.as_bytes()).is_empty());
        let events = parser.feed(suffix.as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_json().unwrap()["choices"][0]["delta"]["content"],
            "Hi"
        );
    }

    #[test]
    fn byte_at_a_time_equals_whole() {
        let body = b"event: delta\ndata: {\"a\":1}\n\ndata: [DONE]\n\n";

        let mut whole = SseParser::new();
        let expected = whole.feed(body);

        let mut trickle = SseParser::new();
        let mut got = Vec::new();
        for byte in body.iter() {
            got.extend(trickle.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(expected, got);
        assert_eq!(expected.len(), 2);
    }

    #[test]
    fn multiple_data_lines_concatenate_with_newline() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: line one\ndata: line two\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].data,
            FrameData::Text("line one\nline two".to_string())
        );
    }

    #[test]
    fn event_and_id_fields() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: message_delta\nid: 7\ndata: {}\n\n");
        assert_eq!(events[0].event.as_deref(), Some("message_delta"));
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn invalid_retry_is_ignored() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"retry: not-a-number\ndata: x\n\n");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn comment_lines_are_skipped() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keepalive\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, FrameData::Text("x".to_string()));
    }

    #[test]
    fn done_sentinel_survives_as_text() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: [DONE]\n\n");
        assert!(events[0].is_done_sentinel());
    }

    #[test]
    fn crlf_line_endings() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: {\"x\":1}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_json(), Some(&json!({"x": 1})));
    }

    #[test]
    fn events_without_data_are_discarded() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: ping\n\ndata: x\n\n");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn remaining_holds_partial_event() {
        let mut parser = SseParser::new();
        parser.feed(b"data: partial");
        assert_eq!(parser.remaining(), b"data: partial");
    }
}
