use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn api_key_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)api.?key").unwrap())
}

/// A provider-native HTTP request produced by an adapter's builder.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    /// Ordered header list; duplicate names allowed.
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy of the request safe to log or capture: authorization-like
    /// header values are masked.
    pub fn redacted(&self) -> HttpRequest {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                if is_sensitive_header(name) {
                    (name.clone(), "[REDACTED]".to_string())
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect();

        HttpRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers,
            body: self.body.clone(),
        }
    }
}

/// Whether a header may carry a credential: `authorization`, `x-api-key`,
/// and anything matching `api.?key` case-insensitively.
pub fn is_sensitive_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("authorization") || api_key_header_regex().is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_sensitive_headers() {
        assert!(is_sensitive_header("Authorization"));
        assert!(is_sensitive_header("x-api-key"));
        assert!(is_sensitive_header("X-Api-Key"));
        assert!(is_sensitive_header("apikey"));
        assert!(is_sensitive_header("x-goog-api-key"));
        assert!(!is_sensitive_header("content-type"));
        assert!(!is_sensitive_header("anthropic-version"));
    }

    #[test]
    fn redaction_masks_credentials() {
        let request = HttpRequest::post("https://api.example.com/v1/chat", json!({}))
            .header("authorization", "Bearer sk-secret")
            .header("x-api-key", "sk-ant-secret")
            .header("anthropic-version", "2023-06-01");

        let redacted = request.redacted();
        let serialized = format!("{redacted:?}");
        assert!(!serialized.contains("sk-secret"));
        assert!(!serialized.contains("sk-ant-secret"));
        assert_eq!(redacted.header_value("anthropic-version"), Some("2023-06-01"));
        assert_eq!(redacted.header_value("authorization"), Some("[REDACTED]"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = HttpRequest::post("https://x", json!({})).header("Accept", "text/event-stream");
        assert_eq!(request.header_value("accept"), Some("text/event-stream"));
    }
}
