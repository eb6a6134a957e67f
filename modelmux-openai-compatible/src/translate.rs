use crate::ProviderKind;
use modelmux_provider::{CallOptions, Error, Model, Operation};
use modelmux_provider_utils::translate::Translation;

/// Options every family member accepts on chat calls.
const CORE_KEYS: &[&str] = &[
    "temperature",
    "max_tokens",
    "max_completion_tokens",
    "top_p",
    "frequency_penalty",
    "presence_penalty",
    "stop",
    "seed",
    "user",
    "logprobs",
    "top_logprobs",
    "parallel_tool_calls",
];

fn provider_keys(kind: ProviderKind) -> &'static [&'static str] {
    match kind {
        ProviderKind::OpenAi => &["reasoning_effort", "service_tier", "store", "logit_bias"],
        ProviderKind::Groq => &["reasoning_effort", "service_tier"],
        ProviderKind::Xai => &["reasoning_effort", "live_search", "search_parameters"],
        ProviderKind::OpenRouter => &["transforms", "route", "models", "provider"],
    }
}

/// Options accepted on embedding calls.
const EMBEDDING_KEYS: &[&str] = &["dimensions", "user"];

/// Per-provider option shaping for the family.
pub fn translate(
    kind: ProviderKind,
    operation: Operation,
    model: &Model,
    options: CallOptions,
) -> Result<(CallOptions, Vec<String>), Error> {
    let allowed: Vec<&str> = match operation {
        Operation::Chat => CORE_KEYS
            .iter()
            .chain(provider_keys(kind).iter())
            .copied()
            .collect(),
        Operation::Embedding => EMBEDDING_KEYS.to_vec(),
    };

    let mut translation = Translation::new(options).retain_known(&allowed);

    if operation == Operation::Chat {
        match kind {
            ProviderKind::OpenAi if is_o_family(&model.model) => {
                translation = translation
                    .rename("max_tokens", "max_completion_tokens")?
                    .drop_option(
                        "temperature",
                        "o-family reasoning models do not support temperature",
                    );
            }
            ProviderKind::Xai if model.model.starts_with("grok-4") => {
                translation = translation
                    .drop_option("frequency_penalty", "not supported by grok-4 models")
                    .drop_option("presence_penalty", "not supported by grok-4 models")
                    .drop_option("stop", "not supported by grok-4 models");
            }
            _ => {}
        }
    }

    Ok(translation.finish())
}

/// Reasoning model families that reject sampling controls and use
/// `max_completion_tokens`.
fn is_o_family(model: &str) -> bool {
    ["o1", "o3", "o4"]
        .iter()
        .any(|prefix| model == *prefix || model.starts_with(&format!("{prefix}-")))
}
