use crate::credentials;
use crate::prompt::{ModelSpec, Prompt};
use crate::registry;
use modelmux_provider::{
    CallOptions, Context, Error, HttpRequest, Model, Operation, ProviderAdapter,
};
use serde_json::json;
use std::sync::Arc;

/// A fully prepared call: model joined with the registry, options
/// translated, credentials attached to the built request.
pub(crate) struct PreparedCall {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub model: Model,
    pub context: Context,
    pub options: CallOptions,
    pub warnings: Vec<String>,
    pub request: HttpRequest,
}

impl std::fmt::Debug for PreparedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedCall")
            .field("model", &self.model)
            .field("context", &self.context)
            .field("options", &self.options)
            .field("warnings", &self.warnings)
            .field("request", &self.request)
            .finish()
    }
}

/// The shared front half of every operation: parse → registry join →
/// translate (warnings logged) → resolve credentials → build → decorate.
pub(crate) fn prepare_chat(
    spec: impl Into<ModelSpec>,
    prompt: impl Into<Prompt>,
    mut options: CallOptions,
    stream: bool,
) -> Result<PreparedCall, Error> {
    let registry = registry::global();

    let model = spec.into().into_model()?;
    let adapter = registry.get(&model.provider)?;
    let mut joined = registry.get_model(&model.provider, &model.model)?;

    // Runtime knobs from the parsed model survive the catalog join.
    joined.temperature = model.temperature;
    joined.max_tokens = model.max_tokens;
    joined.max_retries = options.max_retries().unwrap_or(model.max_retries);

    // Model-level settings become options unless the caller already set
    // them; an explicitly unset temperature stays unset.
    if let Some(temperature) = joined.temperature {
        if !options.contains("temperature") {
            options.set("temperature", json!(temperature));
        }
    }
    if let Some(max_tokens) = joined.max_tokens {
        if !options.contains("max_tokens") {
            options.set("max_tokens", json!(max_tokens));
        }
    }
    if stream {
        options.set("stream", json!(true));
    }

    let context = prompt.into().into_context();
    context.validate()?;

    let (translated, warnings) = adapter.translate_options(Operation::Chat, &joined, options)?;
    for warning in &warnings {
        log::warn!("{}: {warning}", joined.provider);
    }

    let mut request = adapter.build_request(Operation::Chat, &joined, &context, &translated)?;

    if adapter.requires_api_key() {
        let (api_key, source) = credentials::resolve(&registry, &joined.provider, &translated)?;
        log::debug!("resolved {} credentials from {source:?}", joined.provider);
        adapter.attach_credentials(&mut request, &api_key);
    }

    Ok(PreparedCall {
        adapter,
        model: joined,
        context,
        options: translated,
        warnings,
        request,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_joins_catalog_and_attaches_credentials() {
        let options = CallOptions::new().with_api_key("sk-test");
        let prepared = prepare_chat("openai:gpt-4o", "hello", options, false).unwrap();

        assert_eq!(prepared.model.provider, "openai");
        assert!(prepared.model.limit.is_some());
        assert_eq!(
            prepared.request.header_value("authorization"),
            Some("Bearer sk-test")
        );
        assert_eq!(prepared.request.body["messages"][0]["content"], "hello");
        assert!(prepared.warnings.is_empty());
    }

    #[test]
    fn unknown_model_is_rejected_by_the_catalog_join() {
        let options = CallOptions::new().with_api_key("sk-test");
        let err = prepare_chat("openai:gpt-0", "hello", options, false).unwrap_err();
        assert!(matches!(err, Error::ModelNotFound { .. }));
    }

    #[test]
    fn invalid_spec_is_rejected_before_any_lookup() {
        let err = prepare_chat("invalid", "hello", CallOptions::new(), false).unwrap_err();
        assert!(matches!(err, Error::InvalidModelSpec { .. }));
    }

    #[test]
    fn model_runtime_settings_flow_into_options() {
        let model = Model::new("openai", "gpt-4o").with_temperature(0.3);
        let options = CallOptions::new().with_api_key("sk-test");
        let prepared = prepare_chat(model, "hello", options, false).unwrap();
        assert_eq!(prepared.request.body["temperature"], 0.3);
    }

    #[test]
    fn caller_temperature_beats_model_temperature() {
        let model = Model::new("openai", "gpt-4o").with_temperature(0.3);
        let options = CallOptions::new().with_api_key("sk-test").with_temperature(0.9);
        let prepared = prepare_chat(model, "hello", options, false).unwrap();
        assert_eq!(prepared.request.body["temperature"], 0.9);
    }

    #[test]
    fn o_family_translation_flows_through_prepare() {
        let options = CallOptions::new()
            .with_api_key("sk-test")
            .with_max_tokens(1000)
            .with_temperature(0.7);
        let prepared = prepare_chat("openai:o1-mini", "hello", options, false).unwrap();

        assert_eq!(prepared.request.body["max_completion_tokens"], 1000);
        assert!(prepared.request.body.get("temperature").is_none());
        assert_eq!(prepared.warnings.len(), 1);
        assert!(prepared.warnings[0].contains("temperature"));
    }
}
