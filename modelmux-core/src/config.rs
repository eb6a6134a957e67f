//! Process-wide configuration and the in-memory secret store.
//!
//! Both are plain string maps guarded by a lock; credential resolution
//! consults them between per-call options and environment variables.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

fn config_cell() -> &'static RwLock<HashMap<String, String>> {
    static CONFIG: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();
    CONFIG.get_or_init(|| RwLock::new(HashMap::new()))
}

fn secrets_cell() -> &'static RwLock<HashMap<String, String>> {
    static SECRETS: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();
    SECRETS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn read(cell: &'static RwLock<HashMap<String, String>>, key: &str) -> Option<String> {
    match cell.read() {
        Ok(guard) => guard.get(key).cloned(),
        Err(poisoned) => poisoned.into_inner().get(key).cloned(),
    }
}

fn write(cell: &'static RwLock<HashMap<String, String>>, key: String, value: String) {
    match cell.write() {
        Ok(mut guard) => {
            guard.insert(key, value);
        }
        Err(poisoned) => {
            poisoned.into_inner().insert(key, value);
        }
    }
}

/// Set a process-wide configuration value, e.g. `anthropic_api_key`.
pub fn set(key: impl Into<String>, value: impl Into<String>) {
    write(config_cell(), key.into(), value.into());
}

/// Read a process-wide configuration value.
pub fn get(key: &str) -> Option<String> {
    read(config_cell(), key)
}

/// Store a secret in the in-memory secret store.
pub fn put_secret(key: impl Into<String>, value: impl Into<String>) {
    write(secrets_cell(), key.into(), value.into());
}

/// Read a secret from the in-memory secret store.
pub fn get_secret(key: &str) -> Option<String> {
    read(secrets_cell(), key)
}
