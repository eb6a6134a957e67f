use crate::catalog::{self, ProviderCatalog};
use modelmux_provider::{Error, Model, ProviderAdapter};
use modelmux_anthropic::AnthropicAdapter;
use modelmux_bedrock::BedrockAdapter;
use modelmux_google::GoogleAdapter;
use modelmux_openai_compatible::OpenAiCompatibleAdapter;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

/// One registered provider: an adapter (absent for metadata-only
/// providers) plus its catalog metadata.
#[derive(Clone)]
pub struct ProviderEntry {
    pub adapter: Option<Arc<dyn ProviderAdapter>>,
    pub catalog: ProviderCatalog,
}

impl ProviderEntry {
    pub fn is_implemented(&self) -> bool {
        self.adapter.is_some()
    }
}

/// Immutable provider registry snapshot.
///
/// The process-wide registry lives behind an atomic-swap cell: readers
/// clone the current `Arc`, replacement installs a whole new snapshot.
#[derive(Default, Clone)]
pub struct Registry {
    providers: HashMap<String, ProviderEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter and catalog file. Per-provider
    /// catalog failures are logged and skipped, never fatal.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        for (id, parsed) in catalog::builtin_catalogs() {
            match parsed {
                Ok(catalog) => {
                    registry
                        .providers
                        .insert(id, ProviderEntry { adapter: None, catalog });
                }
                Err(err) => log::warn!("skipping catalog for provider {id}: {err}"),
            }
        }

        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(OpenAiCompatibleAdapter::openai()),
            Arc::new(OpenAiCompatibleAdapter::groq()),
            Arc::new(OpenAiCompatibleAdapter::xai()),
            Arc::new(OpenAiCompatibleAdapter::openrouter()),
            Arc::new(AnthropicAdapter::new()),
            Arc::new(GoogleAdapter::new()),
            Arc::new(BedrockAdapter::new()),
        ];
        for adapter in adapters {
            registry.register_adapter(adapter);
        }

        registry
    }

    /// Merge `{provider_id}.json` files from a directory; entries without
    /// an adapter register as metadata-only.
    pub fn load_catalog_dir(&mut self, dir: impl AsRef<Path>) {
        for (id, catalog) in catalog::load_dir(dir) {
            match self.providers.get_mut(&id) {
                Some(entry) => entry.catalog = catalog,
                None => {
                    self.providers
                        .insert(id, ProviderEntry { adapter: None, catalog });
                }
            }
        }
    }

    /// Register an adapter under its provider id. Re-registering the same
    /// adapter instance is a no-op; a different adapter for an existing
    /// id is rejected and logged without mutating the registry. Returns
    /// whether the adapter is registered afterwards.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ProviderAdapter>) -> bool {
        let id = adapter.provider_id().to_string();

        match self.providers.get_mut(&id) {
            Some(entry) => match &entry.adapter {
                None => {
                    entry.adapter = Some(adapter);
                    true
                }
                Some(existing) => {
                    if Arc::ptr_eq(existing, &adapter) {
                        true
                    } else {
                        log::warn!(
                            "provider {id} already has a registered adapter; ignoring conflicting registration"
                        );
                        false
                    }
                }
            },
            None => {
                self.providers.insert(
                    id,
                    ProviderEntry {
                        adapter: Some(adapter),
                        catalog: ProviderCatalog::default(),
                    },
                );
                true
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn ProviderAdapter>, Error> {
        self.providers
            .get(id)
            .and_then(|entry| entry.adapter.clone())
            .ok_or_else(|| Error::invalid_provider(id))
    }

    pub fn entry(&self, id: &str) -> Option<&ProviderEntry> {
        self.providers.get(id)
    }

    /// Join catalog metadata onto a model identifier. The model must
    /// exist in the provider's catalog unless the catalog is empty, in
    /// which case the identifier passes through with defaults.
    pub fn get_model(&self, id: &str, name: &str) -> Result<Model, Error> {
        let entry = self
            .providers
            .get(id)
            .ok_or_else(|| Error::invalid_provider(id))?;

        let mut model = Model::new(id, name);

        if entry.catalog.models.is_empty() {
            return Ok(model);
        }

        let catalog_model = entry
            .catalog
            .model(name)
            .ok_or_else(|| Error::model_not_found(id, name))?;

        model.limit = catalog_model.limit;
        model.modalities = catalog_model.modalities.clone();
        model.capabilities = Some(catalog_model.capabilities());
        model.cost = catalog_model.cost;

        Ok(model)
    }

    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn list_implemented_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .providers
            .iter()
            .filter(|(_, entry)| entry.is_implemented())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn list_metadata_only_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .providers
            .iter()
            .filter(|(_, entry)| !entry.is_implemented())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Environment variable name for a provider's API key. Precedence:
    /// adapter `default_env_key`, catalog `provider.env[0]`, then the
    /// `UPPER(ID)_API_KEY` convention.
    pub fn env_var_name(&self, id: &str) -> String {
        if let Some(entry) = self.providers.get(id) {
            if let Some(env_key) = entry
                .adapter
                .as_ref()
                .and_then(|adapter| adapter.default_env_key())
            {
                return env_key.to_string();
            }
            if let Some(first) = entry.catalog.provider.env.first() {
                return first.clone();
            }
        }
        format!("{}_API_KEY", id.to_uppercase())
    }
}

fn global_cell() -> &'static RwLock<Arc<Registry>> {
    static GLOBAL: OnceLock<RwLock<Arc<Registry>>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(Arc::new(Registry::builtin())))
}

/// The current process-wide registry snapshot.
pub fn global() -> Arc<Registry> {
    global_cell()
        .read()
        .map(|guard| guard.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

/// Atomically replace the process-wide registry.
pub fn install(registry: Registry) {
    let snapshot = Arc::new(registry);
    match global_cell().write() {
        Ok(mut guard) => *guard = snapshot,
        Err(poisoned) => *poisoned.into_inner() = snapshot,
    }
}
