use serde_json::{Map, Value};

/// Accumulates streamed tool-call argument fragments.
///
/// Providers deliver tool arguments as partial JSON strings spread over
/// many chunks. Fragments concatenate under a caller-chosen key (the
/// call id, or a delta index for providers that only send the id on the
/// first fragment) until the whole string parses.
#[derive(Debug, Default)]
pub struct JsonFragmentAccumulator {
    calls: Vec<PendingCall>,
}

#[derive(Debug)]
struct PendingCall {
    key: String,
    id: Option<String>,
    name: Option<String>,
    buffer: String,
}

/// A completed tool call assembled from fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl JsonFragmentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment under `key`. Id and name usually arrive on the
    /// first fragment only; later `None`s keep the recorded values.
    pub fn feed(&mut self, key: &str, id: Option<&str>, name: Option<&str>, fragment: &str) {
        match self.calls.iter_mut().find(|c| c.key == key) {
            Some(call) => {
                if call.id.is_none() {
                    call.id = id.map(str::to_string);
                }
                if call.name.is_none() {
                    call.name = name.map(str::to_string);
                }
                call.buffer.push_str(fragment);
            }
            None => self.calls.push(PendingCall {
                key: key.to_string(),
                id: id.map(str::to_string),
                name: name.map(str::to_string),
                buffer: fragment.to_string(),
            }),
        }
    }

    /// Whether the arguments under `key` currently parse as JSON.
    pub fn is_complete(&self, key: &str) -> bool {
        self.calls
            .iter()
            .find(|c| c.key == key)
            .map(|c| parse_arguments(&c.buffer).is_some())
            .unwrap_or(false)
    }

    /// Raw accumulated text under `key`, for error reporting.
    pub fn partial(&self, key: &str) -> Option<&str> {
        self.calls
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.buffer.as_str())
    }

    /// Concatenation of every buffer, for error reporting.
    pub fn partial_all(&self) -> String {
        self.calls
            .iter()
            .map(|c| c.buffer.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Assemble every call whose buffer parses, in arrival order. Calls
    /// with non-empty buffers that do not parse are dropped; empty
    /// buffers become `{}`. The key stands in for a missing id.
    pub fn finish(self) -> Vec<AssembledCall> {
        self.calls
            .into_iter()
            .filter_map(|call| {
                let arguments = parse_arguments(&call.buffer)?;
                Some(AssembledCall {
                    id: call.id.unwrap_or_else(|| call.key.clone()),
                    name: call.name.unwrap_or_default(),
                    arguments,
                })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

fn parse_arguments(buffer: &str) -> Option<Value> {
    if buffer.trim().is_empty() {
        return Some(Value::Object(Map::new()));
    }
    serde_json::from_str(buffer).ok()
}
