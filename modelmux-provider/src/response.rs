use crate::context::Context;
use crate::message::Message;
use crate::usage::Usage;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Why the model stopped generating.
///
/// Unknown non-null provider reasons are preserved verbatim in `Other`;
/// a missing reason is represented as `Option::<FinishReason>::None` at
/// the use sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FinishReason {
    fn from(s: &str) -> Self {
        match s {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for FinishReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FinishReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl de::Visitor<'_> for Visitor {
            type Value = FinishReason;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a finish reason string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FinishReason, E> {
                Ok(FinishReason::from(v))
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}

/// A complete, non-streaming generation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Provider response id; generated locally when the provider omits one.
    pub id: String,

    /// Model name as returned by the provider, falling back to the
    /// requested name.
    pub model: String,

    /// The conversation with the assistant message appended.
    pub context: Context,

    /// The assistant message produced by this call.
    pub message: Message,

    pub usage: Usage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Top-level response keys not consumed by the canonical shape.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub provider_meta: Map<String, Value>,

    /// Option-translation warnings surfaced at the boundary.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl GenerateResponse {
    /// Concatenated text of the assistant message.
    pub fn text(&self) -> String {
        self.message.content.text()
    }

    /// Tool calls requested by the assistant message.
    pub fn tool_calls(&self) -> Vec<&crate::content::ContentPart> {
        self.message.tool_call_parts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_round_trip() {
        for (s, expected) in [
            ("stop", FinishReason::Stop),
            ("length", FinishReason::Length),
            ("tool_calls", FinishReason::ToolCalls),
            ("content_filter", FinishReason::ContentFilter),
            ("weird", FinishReason::Other("weird".to_string())),
        ] {
            assert_eq!(FinishReason::from(s), expected);
            let json = serde_json::to_string(&expected).unwrap();
            let back: FinishReason = serde_json::from_str(&json).unwrap();
            assert_eq!(back, expected);
        }
    }

    #[test]
    fn other_preserves_provider_string() {
        assert_eq!(FinishReason::from("model_length").as_str(), "model_length");
    }
}
