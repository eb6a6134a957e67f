use crate::response::FinishReason;
use crate::usage::Usage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit emitted on a streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// A fragment of user-facing text.
    Content {
        text: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },

    /// A fragment of model reasoning, distinct from content.
    #[serde(alias = "thinking")]
    Reasoning {
        text: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },

    /// A fragment of a tool call. `arguments` is a partial JSON string;
    /// consumers concatenate fragments per `id` and parse once complete.
    ToolCall {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        arguments: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },

    /// Terminal bookkeeping: usage and finish reason reported by the
    /// provider, merged into the stream's terminal metadata.
    Meta {
        #[serde(default)]
        usage: Usage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<FinishReason>,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },
}

impl StreamChunk {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content {
            text: text.into(),
            metadata: Map::new(),
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning {
            text: text.into(),
            metadata: Map::new(),
        }
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: Option<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name,
            arguments: arguments.into(),
            metadata: Map::new(),
        }
    }

    pub fn meta(usage: Usage, finish_reason: Option<FinishReason>) -> Self {
        Self::Meta {
            usage,
            finish_reason,
            metadata: Map::new(),
        }
    }

    pub fn as_content(&self) -> Option<&str> {
        match self {
            Self::Content { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn as_reasoning(&self) -> Option<&str> {
        match self {
            Self::Reasoning { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Terminal metadata of a stream, resolved once the stream finishes,
/// errors, or is cancelled.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub usage: Usage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Dollar cost derived from catalog prices, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,

    /// True when the stream was cancelled before completion; usage is
    /// whatever had accumulated by then.
    #[serde(default)]
    pub cancelled: bool,
}
