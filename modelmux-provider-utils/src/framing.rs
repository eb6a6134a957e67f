//! Transport-level framers.
//!
//! Framers recover discrete events from a chunked byte stream. They are
//! provider-agnostic and boundary-safe: feeding a body in any chunking,
//! including one byte at a time, produces the same event sequence as
//! feeding it whole.

mod aws_event_stream;
mod json_array;
mod sse;

pub use aws_event_stream::{crc32, EventStreamParser};
pub use json_array::JsonArrayParser;
pub use sse::SseParser;

use modelmux_provider::{FrameEvent, Framing};

enum Mode {
    Sse(SseParser),
    /// Waiting for the first non-whitespace byte to pick SSE vs array.
    Detect(Vec<u8>),
    Array(JsonArrayParser),
    Binary(EventStreamParser),
}

/// Framing dispatcher owned by one stream.
pub struct Framer {
    mode: Mode,
}

impl Framer {
    pub fn new(framing: Framing) -> Self {
        let mode = match framing {
            Framing::Sse => Mode::Sse(SseParser::new()),
            Framing::SseOrJsonArray => Mode::Detect(Vec::new()),
            Framing::AwsEventStream => Mode::Binary(EventStreamParser::new()),
        };
        Self { mode }
    }

    /// Feed one transport chunk; returns every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        match &mut self.mode {
            Mode::Sse(parser) => parser.feed(chunk),
            Mode::Array(parser) => parser.feed(chunk),
            Mode::Binary(parser) => parser.feed(chunk),
            Mode::Detect(pending) => {
                pending.extend_from_slice(chunk);
                let first = pending.iter().find(|b| !b.is_ascii_whitespace());
                match first {
                    None => Vec::new(),
                    Some(b'[') => {
                        let buffered = std::mem::take(pending);
                        let mut parser = JsonArrayParser::new();
                        let events = parser.feed(&buffered);
                        self.mode = Mode::Array(parser);
                        events
                    }
                    Some(_) => {
                        let buffered = std::mem::take(pending);
                        let mut parser = SseParser::new();
                        let events = parser.feed(&buffered);
                        self.mode = Mode::Sse(parser);
                        events
                    }
                }
            }
        }
    }
}
