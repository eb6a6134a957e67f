use crate::usage::Usage;
use serde::{Deserialize, Serialize};

/// Input to an embedding call: one text or a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbedInput {
    Text(String),
    Batch(Vec<String>),
}

impl EmbedInput {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(_) => 1,
            Self::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Batch(items) => items.is_empty(),
        }
    }
}

impl From<&str> for EmbedInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for EmbedInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<String>> for EmbedInput {
    fn from(items: Vec<String>) -> Self {
        Self::Batch(items)
    }
}

/// Result of an embedding call: one vector per input, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f64>>,
    pub model: String,
    #[serde(default)]
    pub usage: Usage,
}

impl EmbedResponse {
    /// The single vector of a one-input call.
    pub fn embedding(&self) -> Option<&[f64]> {
        match self.embeddings.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }
}
