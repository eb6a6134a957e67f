use modelmux_provider::request::is_sensitive_header;

/// Redact credential-bearing headers in a header list, for logging or
/// request capture. Values of `authorization`, `x-api-key`, and any
/// header whose name matches `api.?key` case-insensitively are masked.
pub fn redact_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            if is_sensitive_header(name) {
                (name.clone(), "[REDACTED]".to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}
