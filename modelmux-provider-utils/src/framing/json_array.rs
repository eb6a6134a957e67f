use modelmux_provider::{FrameData, FrameEvent};
use serde_json::Value;

/// Parser for streaming bodies that are one large JSON array.
///
/// Some Gemini configurations return `[{…},{…},…]` instead of SSE. Each
/// complete top-level element is emitted as one event; partial elements
/// wait for more bytes.
#[derive(Default)]
pub struct JsonArrayParser {
    buffer: Vec<u8>,
    started: bool,
    done: bool,
}

impl JsonArrayParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        if self.done {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        loop {
            self.skip_whitespace();

            if !self.started {
                match self.buffer.first() {
                    Some(b'[') => {
                        self.buffer.remove(0);
                        self.started = true;
                    }
                    Some(_) | None => break,
                }
                continue;
            }

            match self.buffer.first() {
                None => break,
                Some(b',') => {
                    self.buffer.remove(0);
                }
                Some(b']') => {
                    self.done = true;
                    self.buffer.clear();
                    break;
                }
                Some(_) => match scan_value(&self.buffer) {
                    Some(len) => {
                        let element: Vec<u8> = self.buffer.drain(..len).collect();
                        let text = String::from_utf8_lossy(&element).into_owned();
                        let data = match serde_json::from_str::<Value>(&text) {
                            Ok(value) => FrameData::Json(value),
                            Err(_) => FrameData::Text(text),
                        };
                        events.push(FrameEvent {
                            data,
                            event: None,
                            id: None,
                        });
                    }
                    None => break,
                },
            }
        }

        events
    }

    fn skip_whitespace(&mut self) {
        let skip = self
            .buffer
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.buffer.drain(..skip);
    }
}

/// Length of the first complete JSON value at the start of `buf`, if one
/// has fully arrived. String and escape aware.
fn scan_value(buf: &[u8]) -> Option<usize> {
    let mut depth: u32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in buf.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                if depth == 0 {
                    // Closing bracket of the enclosing array; scalar ended.
                    return Some(i);
                }
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            b',' if depth == 0 => return Some(i),
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emits_each_element() {
        let mut parser = JsonArrayParser::new();
        let events = parser.feed(b"[{\"a\":1},{\"b\":2}]");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_json(), Some(&json!({"a": 1})));
        assert_eq!(events[1].as_json(), Some(&json!({"b": 2})));
    }

    #[test]
    fn partial_elements_wait_for_more_bytes() {
        let mut parser = JsonArrayParser::new();
        assert!(parser.feed(b"[{\"a\":").is_empty());
        let events = parser.feed(b"1},");
        assert_eq!(events.len(), 1);
        let events = parser.feed(b"{\"b\":2}]");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn byte_at_a_time_equals_whole() {
        let body = br#"[{"x":"a,b}]"},{"y":[1,2,{"z":3}]}]"#;

        let mut whole = JsonArrayParser::new();
        let expected = whole.feed(body);
        assert_eq!(expected.len(), 2);

        let mut trickle = JsonArrayParser::new();
        let mut got = Vec::new();
        for byte in body.iter() {
            got.extend(trickle.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(expected, got);
    }

    #[test]
    fn nothing_after_close_bracket() {
        let mut parser = JsonArrayParser::new();
        let events = parser.feed(b"[{\"a\":1}]");
        assert_eq!(events.len(), 1);
        assert!(parser.feed(b"{\"ignored\":true}").is_empty());
    }

    #[test]
    fn whitespace_between_elements() {
        let mut parser = JsonArrayParser::new();
        let events = parser.feed(b"[ {\"a\":1} ,\n {\"b\":2} ]");
        assert_eq!(events.len(), 2);
    }
}
