use modelmux_provider::{Capabilities, Modalities, ModelCost, ModelLimit};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Provider-level metadata from a catalog file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderMetadata {
    /// Environment variables carrying the provider's API key, in
    /// precedence order.
    #[serde(default)]
    pub env: Vec<String>,
}

/// One model entry from a catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogModel {
    pub id: String,

    #[serde(default)]
    pub limit: Option<ModelLimit>,

    #[serde(default)]
    pub modalities: Option<Modalities>,

    #[serde(default)]
    pub cost: Option<ModelCost>,

    #[serde(default)]
    pub reasoning: bool,

    #[serde(default)]
    pub tool_call: bool,

    #[serde(default = "default_true")]
    pub temperature: bool,

    #[serde(default)]
    pub attachment: bool,
}

fn default_true() -> bool {
    true
}

impl CatalogModel {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            reasoning: self.reasoning,
            tool_call: self.tool_call,
            temperature: self.temperature,
            attachment: self.attachment,
        }
    }
}

/// Parsed contents of one `{provider_id}.json` catalog file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCatalog {
    #[serde(default)]
    pub provider: ProviderMetadata,

    #[serde(default)]
    pub models: Vec<CatalogModel>,
}

impl ProviderCatalog {
    pub fn model(&self, id: &str) -> Option<&CatalogModel> {
        self.models.iter().find(|m| m.id == id)
    }
}

/// Catalog files bundled into the binary, one per built-in provider.
/// Hyphens in file names map to underscores in provider ids.
pub fn builtin_catalogs() -> Vec<(String, Result<ProviderCatalog, serde_json::Error>)> {
    const FILES: &[(&str, &str)] = &[
        ("anthropic", include_str!("../catalog/anthropic.json")),
        ("openai", include_str!("../catalog/openai.json")),
        ("google", include_str!("../catalog/google.json")),
        ("groq", include_str!("../catalog/groq.json")),
        ("xai", include_str!("../catalog/xai.json")),
        ("openrouter", include_str!("../catalog/openrouter.json")),
        ("bedrock", include_str!("../catalog/bedrock.json")),
        ("deepseek", include_str!("../catalog/deepseek.json")),
        ("mistral_ai", include_str!("../catalog/mistral-ai.json")),
    ];

    FILES
        .iter()
        .map(|(id, raw)| (id.to_string(), serde_json::from_str(raw)))
        .collect()
}

/// Load `{provider_id}.json` files from a directory at runtime. Files
/// that fail to read or parse are skipped with a logged warning; one bad
/// file never aborts the load.
pub fn load_dir(dir: impl AsRef<Path>) -> HashMap<String, ProviderCatalog> {
    let mut catalogs = HashMap::new();

    let entries = match std::fs::read_dir(dir.as_ref()) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("cannot read catalog directory {:?}: {err}", dir.as_ref());
            return catalogs;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let provider_id = stem.replace('-', "_");

        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<ProviderCatalog>(&raw) {
                Ok(catalog) => {
                    catalogs.insert(provider_id, catalog);
                }
                Err(err) => log::warn!("skipping catalog file for {provider_id}: {err}"),
            },
            Err(err) => log::warn!("skipping unreadable catalog file for {provider_id}: {err}"),
        }
    }

    catalogs
}
