use modelmux_provider::{CallOptions, Error, Model, Operation};
use modelmux_provider_utils::translate::{ensure_mutex, Translation};
use serde_json::json;

const ALLOWED_KEYS: &[&str] = &[
    "temperature",
    "max_tokens",
    "top_p",
    "top_k",
    "stop_sequences",
    "thinking",
    "metadata",
    "service_tier",
];

/// Thinking budgets for the reasoning-effort buckets.
fn thinking_budget(effort: &str) -> Option<u64> {
    match effort {
        "low" => Some(2048),
        "medium" => Some(8192),
        "high" => Some(16384),
        _ => None,
    }
}

pub fn translate(
    _operation: Operation,
    _model: &Model,
    options: CallOptions,
) -> Result<(CallOptions, Vec<String>), Error> {
    ensure_mutex(&options, &["thinking", "reasoning_effort"])?;

    let mut translation = Translation::new(options).rename("stop", "stop_sequences")?;

    if let Some(effort) = translation
        .options
        .get("reasoning_effort")
        .and_then(|v| v.as_str())
        .map(str::to_string)
    {
        translation.options.remove("reasoning_effort");
        match thinking_budget(&effort) {
            Some(budget) => translation.options.set(
                "thinking",
                json!({"type": "enabled", "budget_tokens": budget}),
            ),
            None => {
                return Err(Error::invalid_parameter(format!(
                    "unknown reasoning_effort {effort:?}; expected low, medium, or high"
                )))
            }
        }
    }

    // Extended thinking rejects simultaneous sampling controls.
    if translation.options.contains("thinking") {
        ensure_mutex(&translation.options, &["temperature", "top_p"])?;
    }

    Ok(translation.retain_known(ALLOWED_KEYS).finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model::new("anthropic", "claude-sonnet-4-20250514")
    }

    #[test]
    fn stop_renames_to_stop_sequences() {
        let options = CallOptions::new().with("stop", json!(["END"]));
        let (translated, _) = translate(Operation::Chat, &model(), options).unwrap();
        assert_eq!(translated.get("stop_sequences"), Some(&json!(["END"])));
        assert!(!translated.contains("stop"));
    }

    #[test]
    fn reasoning_effort_becomes_thinking_budget() {
        let options = CallOptions::new().with("reasoning_effort", json!("medium"));
        let (translated, _) = translate(Operation::Chat, &model(), options).unwrap();
        assert_eq!(
            translated.get("thinking"),
            Some(&json!({"type": "enabled", "budget_tokens": 8192}))
        );
    }

    #[test]
    fn unknown_effort_is_invalid() {
        let options = CallOptions::new().with("reasoning_effort", json!("extreme"));
        assert!(translate(Operation::Chat, &model(), options).is_err());
    }

    #[test]
    fn thinking_and_reasoning_effort_are_exclusive() {
        let options = CallOptions::new()
            .with("thinking", json!({"type": "enabled", "budget_tokens": 1024}))
            .with("reasoning_effort", json!("low"));
        assert!(translate(Operation::Chat, &model(), options).is_err());
    }

    #[test]
    fn thinking_rejects_temperature_plus_top_p() {
        let options = CallOptions::new()
            .with("thinking", json!({"type": "enabled", "budget_tokens": 1024}))
            .with_temperature(0.5)
            .with_top_p(0.9);
        assert!(translate(Operation::Chat, &model(), options).is_err());

        let options = CallOptions::new()
            .with("thinking", json!({"type": "enabled", "budget_tokens": 1024}))
            .with_temperature(0.5);
        assert!(translate(Operation::Chat, &model(), options).is_ok());
    }

    #[test]
    fn unknown_keys_drop_with_warning() {
        let options = CallOptions::new().with("frequency_penalty", json!(0.5));
        let (translated, warnings) = translate(Operation::Chat, &model(), options).unwrap();
        assert!(!translated.contains("frequency_penalty"));
        assert_eq!(warnings.len(), 1);
    }
}
