use crate::error::Error;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

const MAX_TOOL_NAME_LEN: usize = 64;

fn tool_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap())
}

/// Specification of one tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    /// JSON Schema primitive type name: `string`, `number`, `integer`,
    /// `boolean`, `array`, `object`.
    pub param_type: String,
    pub required: bool,
    pub default: Option<Value>,
    pub doc: Option<String>,
}

impl ParameterSpec {
    pub fn new(param_type: impl Into<String>) -> Self {
        Self {
            param_type: param_type.into(),
            required: false,
            default: None,
            doc: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// Named parameter specs, renderable to a JSON Schema object schema.
///
/// BTreeMap keeps rendering deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSchema {
    params: BTreeMap<String, ParameterSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.params.insert(name.into(), spec);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Render as a draft-07 object schema.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for (name, spec) in &self.params {
            let mut prop = Map::new();
            prop.insert("type".to_string(), json!(spec.param_type));
            if let Some(doc) = &spec.doc {
                prop.insert("description".to_string(), json!(doc));
            }
            if let Some(default) = &spec.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(name.clone(), Value::Object(prop));

            if spec.required {
                required.push(json!(name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check an argument object against the schema: required keys present
    /// and primitive types matching.
    pub fn validate_input(&self, input: &Value) -> Result<(), Error> {
        let obj = input
            .as_object()
            .ok_or_else(|| Error::invalid_parameter("tool input must be a JSON object"))?;

        for (name, spec) in &self.params {
            match obj.get(name) {
                None => {
                    if spec.required {
                        return Err(Error::invalid_parameter(format!(
                            "missing required tool parameter {name:?}"
                        )));
                    }
                }
                Some(value) => {
                    if !type_matches(&spec.param_type, value) {
                        return Err(Error::invalid_parameter(format!(
                            "tool parameter {name:?} expected type {}",
                            spec.param_type
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Callback invoked by the caller with validated arguments.
pub type ToolCallback = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync>;

/// A tool the model may request. The runtime renders the schema into the
/// request and validates arguments; invoking the callback is the
/// caller's job.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    parameters: ParameterSchema,
    /// Pre-rendered JSON Schema overriding `parameters`, for callers that
    /// already hold a schema (the structured-output engine does).
    raw_schema: Option<Value>,
    callback: Option<ToolCallback>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
    ) -> Result<Self, Error> {
        let name = name.into();
        if name.len() > MAX_TOOL_NAME_LEN || !tool_name_regex().is_match(&name) {
            return Err(Error::invalid_parameter(format!(
                "invalid tool name {name:?}"
            )));
        }

        Ok(Self {
            name,
            description: description.into(),
            parameters,
            raw_schema: None,
            callback: None,
        })
    }

    /// Build a tool from an already-rendered JSON Schema object.
    pub fn from_json_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
    ) -> Result<Self, Error> {
        if !schema.is_object() {
            return Err(Error::invalid_schema("tool schema must be a JSON object"));
        }
        let mut tool = Self::new(name, description, ParameterSchema::new())?;
        tool.raw_schema = Some(schema);
        Ok(tool)
    }

    pub fn with_callback(mut self, callback: ToolCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    pub fn callback(&self) -> Option<&ToolCallback> {
        self.callback.as_ref()
    }

    pub fn to_json_schema(&self) -> Value {
        match &self.raw_schema {
            Some(schema) => schema.clone(),
            None => self.parameters.to_json_schema(),
        }
    }

    /// Validate model-produced arguments before the caller dispatches the
    /// callback.
    pub fn validate_input(&self, input: &Value) -> Result<(), Error> {
        match &self.raw_schema {
            Some(schema) => validate_against_raw_schema(input, schema),
            None => self.parameters.validate_input(input),
        }
    }
}

/// Required-key and primitive-type checks against a raw object schema.
fn validate_against_raw_schema(input: &Value, schema: &Value) -> Result<(), Error> {
    let obj = input
        .as_object()
        .ok_or_else(|| Error::invalid_parameter("tool input must be a JSON object"))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(key) {
                return Err(Error::invalid_parameter(format!(
                    "missing required tool parameter {key:?}"
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, prop) in properties {
            if let (Some(value), Some(expected)) =
                (obj.get(name), prop.get("type").and_then(Value::as_str))
            {
                if !type_matches(expected, value) {
                    return Err(Error::invalid_parameter(format!(
                        "tool parameter {name:?} expected type {expected}"
                    )));
                }
            }
        }
    }

    Ok(())
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_tool() -> Tool {
        Tool::new(
            "get_weather",
            "Current weather for a city",
            ParameterSchema::new()
                .with_param(
                    "city",
                    ParameterSpec::new("string").required().with_doc("City name"),
                )
                .with_param("units", ParameterSpec::new("string").with_default(json!("metric"))),
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_names() {
        assert!(Tool::new("9lives", "", ParameterSchema::new()).is_err());
        assert!(Tool::new("has space", "", ParameterSchema::new()).is_err());
        assert!(Tool::new("a".repeat(65), "", ParameterSchema::new()).is_err());
        assert!(Tool::new("ok_name-2", "", ParameterSchema::new()).is_ok());
    }

    #[test]
    fn renders_json_schema() {
        let schema = weather_tool().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["city"]["type"], "string");
        assert_eq!(schema["properties"]["city"]["description"], "City name");
        assert_eq!(schema["properties"]["units"]["default"], "metric");
        assert_eq!(schema["required"], json!(["city"]));
    }

    #[test]
    fn raw_schema_tools_render_and_validate() {
        let schema = json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        });
        let tool = Tool::from_json_schema("structured_output", "schema output", schema.clone()).unwrap();
        assert_eq!(tool.to_json_schema(), schema);
        assert!(tool.validate_input(&json!({"city": "Paris"})).is_ok());
        assert!(tool.validate_input(&json!({})).is_err());
        assert!(tool.validate_input(&json!({"city": 9})).is_err());

        assert!(Tool::from_json_schema("x", "", json!("not an object")).is_err());
    }

    #[test]
    fn validates_required_and_types() {
        let tool = weather_tool();
        assert!(tool.validate_input(&json!({"city": "Paris"})).is_ok());
        assert!(tool.validate_input(&json!({})).is_err());
        assert!(tool.validate_input(&json!({"city": 42})).is_err());
        assert!(tool.validate_input(&json!("not an object")).is_err());
    }
}
