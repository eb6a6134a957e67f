//! AWS Bedrock adapter.
//!
//! Bedrock fronts many model families behind one signed HTTP surface.
//! Requests branch per model id: `anthropic.*` models use the native
//! Messages body on `/model/{id}/invoke`, everything else goes through
//! Converse. Responses stream in AWS Event Stream binary framing and
//! requests are SigV4-signed by the builder.

mod converse;
mod native;
mod translate;

use chrono::Utc;
use modelmux_provider::{
    CallOptions, Context, Error, FrameEvent, Framing, GenerateResponse, HttpRequest, Model,
    Operation, ProviderAdapter, StreamChunk,
};
use modelmux_provider_utils::sigv4::{sign_request, AwsCredentials};
use serde_json::Value;

const DEFAULT_REGION: &str = "us-east-1";

/// Adapter for the Bedrock runtime API.
pub struct BedrockAdapter {
    region: String,
}

/// Which wire shape a model id selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubPath {
    NativeAnthropic,
    Converse,
}

pub(crate) fn sub_path(model: &Model) -> SubPath {
    if model.model.starts_with("anthropic.") {
        SubPath::NativeAnthropic
    } else {
        SubPath::Converse
    }
}

impl BedrockAdapter {
    pub fn new() -> Self {
        let region = std::env::var("AWS_REGION")
            .ok()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        Self { region }
    }

    pub fn with_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn runtime_url(&self) -> String {
        format!("https://bedrock-runtime.{}.amazonaws.com", self.region)
    }

    /// AWS credentials from options, falling back to the conventional
    /// environment variables.
    fn resolve_aws_credentials(&self, options: &CallOptions) -> Result<AwsCredentials, Error> {
        let from_option = |key: &str| {
            options
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|v| !v.is_empty())
        };
        let from_env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let access_key_id = from_option("aws_access_key_id")
            .or_else(|| from_env("AWS_ACCESS_KEY_ID"))
            .ok_or_else(|| {
                Error::invalid_parameter("missing AWS credentials: set AWS_ACCESS_KEY_ID")
            })?;
        let secret_access_key = from_option("aws_secret_access_key")
            .or_else(|| from_env("AWS_SECRET_ACCESS_KEY"))
            .ok_or_else(|| {
                Error::invalid_parameter("missing AWS credentials: set AWS_SECRET_ACCESS_KEY")
            })?;
        let session_token = from_option("aws_session_token").or_else(|| from_env("AWS_SESSION_TOKEN"));
        let region = from_option("region").unwrap_or_else(|| self.region.clone());

        Ok(AwsCredentials {
            access_key_id,
            secret_access_key,
            session_token,
            region,
        })
    }
}

impl Default for BedrockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderAdapter for BedrockAdapter {
    fn provider_id(&self) -> &str {
        "bedrock"
    }

    fn base_url(&self) -> &str {
        "https://bedrock-runtime.amazonaws.com"
    }

    fn default_env_key(&self) -> Option<&str> {
        Some("AWS_ACCESS_KEY_ID")
    }

    /// Requests are SigV4-signed in the builder from AWS credentials;
    /// there is no bearer key for the runtime to resolve.
    fn requires_api_key(&self) -> bool {
        false
    }

    fn translate_options(
        &self,
        operation: Operation,
        model: &Model,
        options: CallOptions,
    ) -> Result<(CallOptions, Vec<String>), Error> {
        translate::translate(operation, model, options)
    }

    fn build_request(
        &self,
        operation: Operation,
        model: &Model,
        context: &Context,
        options: &CallOptions,
    ) -> Result<HttpRequest, Error> {
        if operation != Operation::Chat {
            return Err(Error::not_implemented(
                "provider bedrock does not support embeddings",
            ));
        }

        let mut request = match sub_path(model) {
            SubPath::NativeAnthropic => {
                native::build_invoke_request(&self.runtime_url(), model, context, options)?
            }
            SubPath::Converse => {
                converse::build_converse_request(&self.runtime_url(), model, context, options)?
            }
        };

        let credentials = self.resolve_aws_credentials(options)?;
        sign_request(&mut request, &credentials, "bedrock", Utc::now());

        Ok(request)
    }

    fn decode_response(&self, body: Value, model: &Model) -> Result<GenerateResponse, Error> {
        match sub_path(model) {
            SubPath::NativeAnthropic => modelmux_anthropic::chat::decode_messages_response(body, model),
            SubPath::Converse => converse::decode_converse_response(body, model),
        }
    }

    fn decode_stream_event(&self, event: &FrameEvent, model: &Model) -> Vec<StreamChunk> {
        match sub_path(model) {
            SubPath::NativeAnthropic => modelmux_anthropic::stream::decode_event(event, model),
            SubPath::Converse => converse::decode_stream_event(event, model),
        }
    }

    fn framing(&self) -> Framing {
        Framing::AwsEventStream
    }

    /// Signing happened in the builder; there is no bearer credential to
    /// attach.
    fn attach_credentials(&self, _request: &mut HttpRequest, _api_key: &str) {}
}
