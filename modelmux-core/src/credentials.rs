use crate::{config, registry::Registry};
use modelmux_provider::{CallOptions, Error};

/// Where a resolved API key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Per-call `api_key` option.
    Option,
    /// Process-wide configuration (`{provider}_api_key`).
    Config,
    /// Environment variable.
    Env,
    /// In-memory secret store.
    SecretStore,
}

/// Resolve a provider API key. First match wins; empty strings are
/// treated as missing and the next source is tried. The key itself is
/// never logged.
pub fn resolve(
    registry: &Registry,
    provider_id: &str,
    options: &CallOptions,
) -> Result<(String, KeySource), Error> {
    if let Some(key) = non_empty(options.api_key().map(str::to_string)) {
        return Ok((key, KeySource::Option));
    }

    let config_key = format!("{provider_id}_api_key");
    if let Some(key) = non_empty(config::get(&config_key)) {
        return Ok((key, KeySource::Config));
    }

    let env_var = registry.env_var_name(provider_id);
    if let Some(key) = non_empty(std::env::var(&env_var).ok()) {
        return Ok((key, KeySource::Env));
    }

    if let Some(key) = non_empty(config::get_secret(&config_key)) {
        return Ok((key, KeySource::SecretStore));
    }

    Err(Error::invalid_parameter(format!(
        "no API key for provider {provider_id}: pass api_key, set config {config_key}, or export {env_var}"
    )))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::builtin()
    }

    #[test]
    fn per_call_option_wins() {
        config::set("openai_api_key", "from-config");
        let options = CallOptions::new().with_api_key("from-option");
        let (key, source) = resolve(&registry(), "openai", &options).unwrap();
        assert_eq!(key, "from-option");
        assert_eq!(source, KeySource::Option);
    }

    #[test]
    fn empty_option_falls_through_to_config() {
        config::set("groq_api_key", "from-config");
        let options = CallOptions::new().with_api_key("");
        let (key, source) = resolve(&registry(), "groq", &options).unwrap();
        assert_eq!(key, "from-config");
        assert_eq!(source, KeySource::Config);
    }

    #[test]
    fn secret_store_is_last_resort() {
        // A provider id no other test configures.
        config::put_secret("mistral_ai_api_key", "from-secrets");
        let (key, source) = resolve(&registry(), "mistral_ai", &CallOptions::new()).unwrap();
        assert_eq!(key, "from-secrets");
        assert_eq!(source, KeySource::SecretStore);
    }

    #[test]
    fn missing_everywhere_names_the_env_var() {
        let err = resolve(&registry(), "acme", &CallOptions::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ACME_API_KEY"));
        assert!(message.contains("acme_api_key"));
    }
}
