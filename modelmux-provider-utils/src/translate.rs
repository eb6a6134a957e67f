use modelmux_provider::{CallOptions, Error};

/// Rename an option key. Errors when both the old and new key are set;
/// silently succeeds when neither is present.
pub fn rename(options: &mut CallOptions, old: &str, new: &str) -> Result<(), Error> {
    if options.contains(old) && options.contains(new) {
        return Err(Error::invalid_parameter(format!(
            "options {old:?} and {new:?} are both set; {old:?} is an alias of {new:?}"
        )));
    }

    if let Some(value) = options.remove(old) {
        options.set(new, value);
    }

    Ok(())
}

/// Remove an option key. Returns a warning string when the key was
/// actually present, `None` otherwise.
pub fn drop_option(options: &mut CallOptions, key: &str, note: &str) -> Option<String> {
    options.remove(key).map(|_| {
        if note.is_empty() {
            format!("option {key:?} is not supported and was dropped")
        } else {
            format!("option {key:?} dropped: {note}")
        }
    })
}

/// Error when more than one of the given keys is set.
pub fn ensure_mutex(options: &CallOptions, keys: &[&str]) -> Result<(), Error> {
    let set: Vec<&str> = keys.iter().copied().filter(|k| options.contains(k)).collect();
    if set.len() > 1 {
        return Err(Error::invalid_parameter(format!(
            "options {set:?} are mutually exclusive"
        )));
    }
    Ok(())
}

/// Folds a series of micro-translations over one options value,
/// accumulating warnings.
pub struct Translation {
    pub options: CallOptions,
    pub warnings: Vec<String>,
}

impl Translation {
    pub fn new(options: CallOptions) -> Self {
        Self {
            options,
            warnings: Vec::new(),
        }
    }

    pub fn rename(mut self, old: &str, new: &str) -> Result<Self, Error> {
        rename(&mut self.options, old, new)?;
        Ok(self)
    }

    pub fn drop_option(mut self, key: &str, note: &str) -> Self {
        if let Some(warning) = drop_option(&mut self.options, key, note) {
            self.warnings.push(warning);
        }
        self
    }

    pub fn ensure_mutex(self, keys: &[&str]) -> Result<Self, Error> {
        ensure_mutex(&self.options, keys)?;
        Ok(self)
    }

    /// Drop every key not in `allowed` (control keys always survive),
    /// warning per dropped key.
    pub fn retain_known(mut self, allowed: &[&str]) -> Self {
        let unknown: Vec<String> = self
            .options
            .keys()
            .filter(|k| {
                !allowed.contains(&k.as_str())
                    && !modelmux_provider::options::CONTROL_KEYS.contains(&k.as_str())
            })
            .cloned()
            .collect();

        for key in unknown {
            if let Some(warning) = drop_option(&mut self.options, &key, "not supported by this provider") {
                self.warnings.push(warning);
            }
        }

        self
    }

    pub fn finish(self) -> (CallOptions, Vec<String>) {
        (self.options, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rename_moves_value() {
        let mut options = CallOptions::new().with("max_tokens", json!(1000));
        rename(&mut options, "max_tokens", "max_completion_tokens").unwrap();
        assert_eq!(options.get("max_tokens"), None);
        assert_eq!(options.get("max_completion_tokens"), Some(&json!(1000)));
    }

    #[test]
    fn rename_errors_when_both_present() {
        let mut options = CallOptions::new()
            .with("max_tokens", json!(1))
            .with("max_completion_tokens", json!(2));
        assert!(rename(&mut options, "max_tokens", "max_completion_tokens").is_err());
    }

    #[test]
    fn drop_warns_only_when_present() {
        let mut options = CallOptions::new().with("temperature", json!(0.7));
        let warning = drop_option(&mut options, "temperature", "o-family models do not support temperature");
        assert!(warning.unwrap().contains("do not support"));
        assert!(drop_option(&mut options, "temperature", "").is_none());
    }

    #[test]
    fn mutex_allows_one() {
        let options = CallOptions::new().with("top_p", json!(0.9));
        assert!(ensure_mutex(&options, &["top_p", "temperature"]).is_ok());

        let options = options.with_temperature(0.5);
        assert!(ensure_mutex(&options, &["top_p", "temperature"]).is_err());
    }

    #[test]
    fn translation_folds_warnings() {
        let options = CallOptions::new()
            .with("max_tokens", json!(1000))
            .with_temperature(0.7);

        let (translated, warnings) = Translation::new(options)
            .rename("max_tokens", "max_completion_tokens")
            .unwrap()
            .drop_option("temperature", "o-family models do not support temperature")
            .finish();

        assert_eq!(translated.get("max_completion_tokens"), Some(&json!(1000)));
        assert!(!translated.contains("temperature"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn retain_known_drops_unknown_but_keeps_control_keys() {
        let options = CallOptions::new()
            .with("live_search", json!(true))
            .with_api_key("sk")
            .with_temperature(0.1);

        let (translated, warnings) = Translation::new(options)
            .retain_known(&["temperature"])
            .finish();

        assert!(!translated.contains("live_search"));
        assert_eq!(translated.api_key(), Some("sk"));
        assert_eq!(translated.temperature(), Some(0.1));
        assert_eq!(warnings.len(), 1);
    }
}
