use modelmux_provider::{CallOptions, Error, Model, Operation};
use modelmux_provider_utils::translate::Translation;
use serde_json::Value;

const ALLOWED_KEYS: &[&str] = &[
    "temperature",
    "max_tokens",
    "top_p",
    "top_k",
    "stop_sequences",
    "candidate_count",
    "safety_settings",
    "thinking_config",
];

/// Gemini buries sampling controls in `generationConfig`; translation
/// keeps the canonical names and the request builder re-nests them.
pub fn translate(
    _operation: Operation,
    _model: &Model,
    options: CallOptions,
) -> Result<(CallOptions, Vec<String>), Error> {
    let mut translation = Translation::new(options).rename("stop", "stop_sequences")?;

    // reasoning_effort maps onto thinkingConfig token budgets.
    if let Some(effort) = translation
        .options
        .remove("reasoning_effort")
        .as_ref()
        .and_then(Value::as_str)
        .map(str::to_string)
    {
        let budget = match effort.as_str() {
            "low" => 1024,
            "medium" => 8192,
            "high" => 24576,
            other => {
                return Err(Error::invalid_parameter(format!(
                    "unknown reasoning_effort {other:?}; expected low, medium, or high"
                )))
            }
        };
        translation
            .options
            .set("thinking_config", serde_json::json!({"thinking_budget": budget}));
    }

    Ok(translation.retain_known(ALLOWED_KEYS).finish())
}
