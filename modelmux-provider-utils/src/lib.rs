//! Shared utilities for modelmux provider adapters.
//!
//! Framed stream parsing (SSE, AWS Event Stream, Gemini JSON arrays),
//! option-translation primitives, JSON fragment accumulation for
//! streamed tool arguments, header redaction, and SigV4 signing.

pub mod framing;
pub mod headers;
pub mod json_fragments;
pub mod sigv4;
pub mod translate;

pub use framing::{EventStreamParser, Framer, JsonArrayParser, SseParser};
pub use json_fragments::{AssembledCall, JsonFragmentAccumulator};
pub use sigv4::{sign_request, AwsCredentials};
pub use translate::{drop_option, ensure_mutex, rename, Translation};
