use crate::tool::Tool;
use serde_json::{json, Map, Value};

/// How the model should select a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    /// Force a specific named tool.
    Tool(String),
}

/// Options for one call.
///
/// Translatable options live in a JSON map so per-provider translation
/// can rename and drop keys; tools and tool choice are typed because
/// they carry callbacks and are rendered per adapter. Control keys
/// (`api_key`, `timeout`, `receive_timeout`, `stream`) are consumed by
/// the runtime and never serialized into a request body.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    values: Map<String, Value>,
    pub tools: Vec<Tool>,
    pub tool_choice: Option<ToolChoice>,
}

/// Keys consumed by the runtime rather than rendered into request bodies.
pub const CONTROL_KEYS: &[&str] = &[
    "api_key",
    "timeout",
    "receive_timeout",
    "max_retries",
    "stream",
    "response_format",
];

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn values_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.values
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Non-control entries, for rendering provider-specific passthrough
    /// options into a request body.
    pub fn body_entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values
            .iter()
            .filter(|(k, _)| !CONTROL_KEYS.contains(&k.as_str()))
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn with_temperature(self, temperature: f64) -> Self {
        self.with("temperature", json!(temperature))
    }

    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        self.with("max_tokens", json!(max_tokens))
    }

    pub fn with_top_p(self, top_p: f64) -> Self {
        self.with("top_p", json!(top_p))
    }

    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        self.with("api_key", json!(api_key.into()))
    }

    pub fn with_stream(self, stream: bool) -> Self {
        self.with("stream", json!(stream))
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn temperature(&self) -> Option<f64> {
        self.values.get("temperature").and_then(Value::as_f64)
    }

    pub fn max_tokens(&self) -> Option<u64> {
        self.values.get("max_tokens").and_then(Value::as_u64)
    }

    pub fn top_p(&self) -> Option<f64> {
        self.values.get("top_p").and_then(Value::as_f64)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.values.get("api_key").and_then(Value::as_str)
    }

    pub fn stream(&self) -> bool {
        self.values
            .get("stream")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Total request timeout in milliseconds.
    pub fn timeout_ms(&self) -> Option<u64> {
        self.values.get("timeout").and_then(Value::as_u64)
    }

    /// Maximum gap between transport chunks in milliseconds.
    pub fn receive_timeout_ms(&self) -> Option<u64> {
        self.values.get("receive_timeout").and_then(Value::as_u64)
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.values
            .get("max_retries")
            .and_then(Value::as_u64)
            .map(|n| n as u32)
    }

    /// The structured-output response format, set by the structured
    /// output engine.
    pub fn response_format(&self) -> Option<&Value> {
        self.values.get("response_format")
    }
}
