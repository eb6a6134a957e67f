use serde_json::Value;
use thiserror::Error;

/// Classification of an API error derived from the HTTP status code.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    /// 429. Carries the `retry-after` delay in seconds when the provider
    /// sent one.
    RateLimited { retry_after: Option<u64> },
    ServerError,
    Other,
}

impl ApiErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited { retry_after: None },
            s if s >= 500 => Self::ServerError,
            _ => Self::Other,
        }
    }
}

/// Canonical error taxonomy for all modelmux operations.
///
/// Every public operation returns `Result<_, Error>`. Adapters map
/// provider-native failures into these kinds; callers never see wire
/// error shapes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("unknown provider: {provider}")]
    InvalidProvider { provider: String },

    #[error("invalid model spec {spec:?}: expected \"provider:model\"")]
    InvalidModelSpec { spec: String },

    #[error("model {model:?} not found for provider {provider}")]
    ModelNotFound { provider: String, model: String },

    #[error("invalid schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("api request failed with status {status}: {reason}")]
    Api {
        status: u16,
        kind: ApiErrorKind,
        reason: String,
        response_body: Option<String>,
    },

    #[error("failed to parse provider response: {reason}")]
    Parse {
        reason: String,
        body: Option<String>,
    },

    #[error("schema validation failed: {reason}")]
    SchemaValidation {
        reason: String,
        /// The text that failed validation, kept for debugging.
        partial: Option<String>,
    },

    #[error("stream error: {reason}")]
    Stream { reason: String },

    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("not implemented: {reason}")]
    NotImplemented { reason: String },

    #[error("{reason}")]
    Unknown { reason: String },
}

impl Error {
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    pub fn invalid_provider(provider: impl Into<String>) -> Self {
        Self::InvalidProvider {
            provider: provider.into(),
        }
    }

    pub fn invalid_model_spec(spec: impl Into<String>) -> Self {
        Self::InvalidModelSpec { spec: spec.into() }
    }

    pub fn model_not_found(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            provider: provider.into(),
            model: model.into(),
        }
    }

    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            reason: reason.into(),
        }
    }

    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            reason: reason.into(),
        }
    }

    pub fn parse(reason: impl Into<String>, body: Option<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
            body,
        }
    }

    pub fn schema_validation(reason: impl Into<String>, partial: Option<String>) -> Self {
        Self::SchemaValidation {
            reason: reason.into(),
            partial,
        }
    }

    pub fn stream(reason: impl Into<String>) -> Self {
        Self::Stream {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn not_implemented(reason: impl Into<String>) -> Self {
        Self::NotImplemented {
            reason: reason.into(),
        }
    }

    /// Map an HTTP error status plus the raw response body into an
    /// [`Error::Api`], probing the body for a human-readable reason.
    pub fn from_status(status: u16, body: &str) -> Self {
        let reason = probe_error_reason(body)
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self::Api {
            status,
            kind: ApiErrorKind::from_status(status),
            reason,
            response_body: if body.is_empty() {
                None
            } else {
                Some(body.to_string())
            },
        }
    }

    /// Like [`Error::from_status`] but with a `retry-after` delay parsed
    /// from the response headers of a 429.
    pub fn from_status_with_retry_after(status: u16, body: &str, retry_after: Option<u64>) -> Self {
        let mut err = Self::from_status(status, body);
        if let Self::Api { kind, .. } = &mut err {
            if matches!(kind, ApiErrorKind::RateLimited { .. }) {
                *kind = ApiErrorKind::RateLimited { retry_after };
            }
        }
        err
    }

    /// Whether the error is worth retrying for an idempotent operation:
    /// transport failures, 429s, and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Api { kind, .. } => matches!(
                kind,
                ApiErrorKind::RateLimited { .. } | ApiErrorKind::ServerError
            ),
            _ => false,
        }
    }

    /// Retry delay requested by the provider, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Api {
                kind: ApiErrorKind::RateLimited { retry_after },
                ..
            } => *retry_after,
            _ => None,
        }
    }
}

/// Probe a provider JSON error body for a human-readable message.
///
/// Providers disagree on where the message lives; the probe order is
/// `error.message`, `error` (when it is a string), `message`, `detail`,
/// `details`, `error_description`. First hit wins.
fn probe_error_reason(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let obj = value.as_object()?;

    if let Some(message) = obj
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }

    for key in ["error", "message", "detail", "details", "error_description"] {
        if let Some(text) = obj.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }

    None
}
