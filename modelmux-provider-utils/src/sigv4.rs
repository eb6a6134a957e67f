//! AWS Signature Version 4 request signing.
//!
//! Bedrock requests are signed over plain HTTP: canonical request,
//! string-to-sign, derived signing key, `Authorization` header.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use modelmux_provider::HttpRequest;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Static AWS credentials for signing.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

/// Sign `request` in place for `service`, adding `host`, `x-amz-date`,
/// optionally `x-amz-security-token`, and `authorization` headers.
pub fn sign_request(
    request: &mut HttpRequest,
    credentials: &AwsCredentials,
    service: &str,
    now: DateTime<Utc>,
) {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let (host, path, query) = split_url(&request.url);
    let payload = request.body.to_string();
    let payload_hash = hex::encode(Sha256::digest(payload.as_bytes()));

    request.set_header("host", host.clone());
    request.set_header("x-amz-date", amz_date.clone());
    if let Some(token) = &credentials.session_token {
        request.set_header("x-amz-security-token", token.clone());
    }

    // Canonical headers: lowercase names, trimmed values, sorted by name.
    let mut header_pairs: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    header_pairs.sort();
    header_pairs.dedup();

    let canonical_headers: String = header_pairs
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = header_pairs
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{method}\n{path}\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
        method = request.method,
    );

    let scope = format!("{date}/{}/{service}/aws4_request", credentials.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{hash}",
        hash = hex::encode(Sha256::digest(canonical_request.as_bytes())),
    );

    let signing_key = derive_signing_key(
        &credentials.secret_access_key,
        &date,
        &credentials.region,
        service,
    );
    let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={akid}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        akid = credentials.access_key_id,
    );
    request.set_header("authorization", authorization);
}

/// The SigV4 key derivation chain:
/// `HMAC(HMAC(HMAC(HMAC("AWS4"+secret, date), region), service), "aws4_request")`.
pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Split a URL into (host, path, query) without percent re-encoding;
/// builders produce already-encoded URLs.
fn split_url(url: &str) -> (String, String, String) {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);

    let (host, path_and_query) = match without_scheme.split_once('/') {
        Some((host, rest)) => (host.to_string(), format!("/{rest}")),
        None => (without_scheme.to_string(), "/".to_string()),
    };

    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (path_and_query, String::new()),
    };

    (host, path, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn signing_key_matches_published_vector() {
        // Example key derivation from the AWS SigV4 documentation.
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20150830",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn url_splitting() {
        let (host, path, query) = split_url("https://bedrock-runtime.us-east-1.amazonaws.com/model/x/invoke");
        assert_eq!(host, "bedrock-runtime.us-east-1.amazonaws.com");
        assert_eq!(path, "/model/x/invoke");
        assert_eq!(query, "");

        let (host, path, query) = split_url("https://example.com/a?b=c");
        assert_eq!(host, "example.com");
        assert_eq!(path, "/a");
        assert_eq!(query, "b=c");
    }

    #[test]
    fn signed_request_carries_required_headers() {
        let mut request = HttpRequest::post(
            "https://bedrock-runtime.us-west-2.amazonaws.com/model/anthropic.claude-3-haiku/invoke",
            json!({"messages": []}),
        );
        let credentials = AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: Some("token".to_string()),
            region: "us-west-2".to_string(),
        };
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        sign_request(&mut request, &credentials, "bedrock", now);

        assert_eq!(
            request.header_value("host"),
            Some("bedrock-runtime.us-west-2.amazonaws.com")
        );
        assert_eq!(request.header_value("x-amz-date"), Some("20240501T120000Z"));
        assert_eq!(request.header_value("x-amz-security-token"), Some("token"));

        let auth = request.header_value("authorization").unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/us-west-2/bedrock/aws4_request"));
        assert!(auth.contains("SignedHeaders="));
        assert!(auth.contains("host;x-amz-date;x-amz-security-token"));
        assert!(auth.contains("Signature="));
    }

    #[test]
    fn same_request_same_time_signs_identically() {
        let make = || {
            let mut request = HttpRequest::post("https://h.example.com/p", json!({"a": 1}));
            let credentials = AwsCredentials {
                access_key_id: "AKID".to_string(),
                secret_access_key: "SECRET".to_string(),
                session_token: None,
                region: "eu-west-1".to_string(),
            };
            let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
            sign_request(&mut request, &credentials, "bedrock", now);
            request.header_value("authorization").unwrap().to_string()
        };
        assert_eq!(make(), make());
    }
}
