use modelmux_provider::{CallOptions, Error, Model, Operation};
use modelmux_provider_utils::translate::Translation;

/// Keys both sub-paths understand, plus the AWS credential overrides the
/// signer consumes. Credential keys never reach a request body.
const ALLOWED_KEYS: &[&str] = &[
    "temperature",
    "max_tokens",
    "top_p",
    "top_k",
    "stop_sequences",
    "thinking",
    "guardrail_identifier",
    "guardrail_version",
    "aws_access_key_id",
    "aws_secret_access_key",
    "aws_session_token",
    "region",
];

pub fn translate(
    _operation: Operation,
    model: &Model,
    options: CallOptions,
) -> Result<(CallOptions, Vec<String>), Error> {
    let mut translation = Translation::new(options).rename("stop", "stop_sequences")?;

    // Converse's inferenceConfig has no topK or thinking knobs.
    if crate::sub_path(model) == crate::SubPath::Converse {
        translation = translation
            .drop_option("top_k", "the Converse API does not expose top_k")
            .drop_option("thinking", "the Converse API does not expose thinking");
    }

    Ok(translation.retain_known(ALLOWED_KEYS).finish())
}
