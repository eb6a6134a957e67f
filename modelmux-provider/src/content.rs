use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One piece of message content.
///
/// Exactly one payload shape per variant; the `metadata` map is always
/// present and defaults to empty. `thinking` is accepted as an alias of
/// `reasoning` on deserialization; the canonical tag is `reasoning`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },

    #[serde(alias = "thinking")]
    Reasoning {
        text: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },

    ImageUrl {
        url: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },

    /// Inline image data, base64-encoded.
    Image {
        data: String,
        media_type: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },

    /// Inline file data, base64-encoded.
    File {
        data: String,
        media_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },

    ToolCall {
        id: String,
        name: String,
        arguments: Value,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },

    ToolResult {
        tool_call_id: String,
        content: Value,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
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

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            url: url.into(),
            metadata: Map::new(),
        }
    }

    pub fn image(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            media_type: media_type.into(),
            metadata: Map::new(),
        }
    }

    pub fn file(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self::File {
            data: data.into(),
            media_type: media_type.into(),
            filename: None,
            metadata: Map::new(),
        }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
            metadata: Map::new(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: Value) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            content,
            metadata: Map::new(),
        }
    }

    /// Text payload of `Text` parts.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Text payload of `Reasoning` parts.
    pub fn as_reasoning(&self) -> Option<&str> {
        match self {
            Self::Reasoning { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        match self {
            Self::Text { metadata, .. }
            | Self::Reasoning { metadata, .. }
            | Self::ImageUrl { metadata, .. }
            | Self::Image { metadata, .. }
            | Self::File { metadata, .. }
            | Self::ToolCall { metadata, .. }
            | Self::ToolResult { metadata, .. } => metadata,
        }
    }
}
