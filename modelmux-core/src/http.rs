use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use modelmux_provider::{Error, HttpRequest};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

/// Cap on how much of an error body is read before giving up on it.
const ERROR_BODY_LIMIT: usize = 16 * 1024;

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// The shared process-wide HTTP client. Connection pooling is internal
/// to reqwest; callers never mutate it.
pub fn client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(reqwest::Client::new)
}

fn to_reqwest(request: &HttpRequest, timeout_ms: Option<u64>) -> reqwest::RequestBuilder {
    let mut builder = match request.method.as_str() {
        "GET" => client().get(&request.url),
        _ => client().post(&request.url),
    };

    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    if request.method != "GET" {
        builder = builder.body(request.body.to_string());
    }
    if let Some(ms) = timeout_ms {
        builder = builder.timeout(Duration::from_millis(ms));
    }

    builder
}

/// Jittered exponential backoff delay for the given retry attempt,
/// honoring a provider-requested delay when present.
fn backoff_delay(attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    if let Some(secs) = retry_after_secs {
        return Duration::from_secs(secs);
    }

    let exp = BASE_BACKOFF_MS.saturating_mul(1u64 << attempt.min(6));
    let capped = exp.min(MAX_BACKOFF_MS);
    // Cheap jitter; this only needs to spread retries, not be random.
    let jitter = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()) % (capped / 2 + 1))
        .unwrap_or(0);
    Duration::from_millis(capped + jitter)
}

/// Truncate an error body without splitting a UTF-8 character.
fn truncate_body(body: &str) -> &str {
    if body.len() <= ERROR_BODY_LIMIT {
        return body;
    }
    let mut end = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

fn retry_after_header(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Send a non-streaming JSON request.
///
/// Transport failures, 429s, and 5xx responses retry with jittered
/// exponential backoff up to `max_retries` times; a `retry-after` header
/// takes precedence over the computed delay. Safe to retry because no
/// response body has been consumed when a retryable failure is seen.
pub async fn send_json(
    request: &HttpRequest,
    timeout_ms: Option<u64>,
    max_retries: u32,
) -> Result<Value, Error> {
    let mut attempt: u32 = 0;

    loop {
        let result = execute_once(request, timeout_ms).await;

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_retries => {
                let delay = backoff_delay(attempt, err.retry_after());
                log::warn!(
                    "request to {} failed ({err}); retry {} of {max_retries} in {delay:?}",
                    request.url,
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn execute_once(request: &HttpRequest, timeout_ms: Option<u64>) -> Result<Value, Error> {
    let response = to_reqwest(request, timeout_ms)
        .send()
        .await
        .map_err(|err| Error::transport(err.to_string()))?;

    let status = response.status().as_u16();
    if !response.status().is_success() {
        let retry_after = retry_after_header(&response);
        let body = response.text().await.unwrap_or_default();
        return Err(Error::from_status_with_retry_after(
            status,
            truncate_body(&body),
            retry_after,
        ));
    }

    let body = response
        .text()
        .await
        .map_err(|err| Error::transport(err.to_string()))?;

    serde_json::from_str(&body).map_err(|err| Error::parse(err.to_string(), Some(body)))
}

/// Open a streaming request and return the response byte stream.
///
/// A non-2xx status reads up to 16 KiB of the body and surfaces the
/// mapped API error before any chunk is produced.
pub async fn connect_stream(
    request: &HttpRequest,
    timeout_ms: Option<u64>,
) -> Result<BoxStream<'static, Result<Bytes, reqwest::Error>>, Error> {
    let send = to_reqwest(request, None).send();

    let response = match timeout_ms {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), send)
            .await
            .map_err(|_| Error::stream(format!("connect timed out after {ms}ms")))?,
        None => send.await,
    }
    .map_err(|err| Error::transport(err.to_string()))?;

    let status = response.status().as_u16();
    if !response.status().is_success() {
        let retry_after = retry_after_header(&response);
        let body = response.text().await.unwrap_or_default();
        return Err(Error::from_status_with_retry_after(
            status,
            truncate_body(&body),
            retry_after,
        ));
    }

    Ok(response.bytes_stream().boxed())
}
