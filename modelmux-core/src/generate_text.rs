use crate::http;
use crate::prepare::{prepare_chat, PreparedCall};
use crate::prompt::{ModelSpec, Prompt};
use modelmux_provider::{CallOptions, Error, GenerateResponse};

/// Generate a complete assistant response.
///
/// `model` accepts a `"provider:model"` spec string or a
/// [`Model`](modelmux_provider::Model); `prompt` accepts a bare user
/// string or a full [`Context`](modelmux_provider::Context).
///
/// ```no_run
/// # async fn run() -> Result<(), modelmux_provider::Error> {
/// let response = modelmux_core::generate_text(
///     "anthropic:claude-3-haiku-20240307",
///     "What is the capital of France?",
///     modelmux_provider::CallOptions::new(),
/// )
/// .await?;
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
pub async fn generate_text(
    model: impl Into<ModelSpec>,
    prompt: impl Into<Prompt>,
    options: CallOptions,
) -> Result<GenerateResponse, Error> {
    let prepared = prepare_chat(model, prompt, options, false)?;
    execute(prepared).await
}

pub(crate) async fn execute(prepared: PreparedCall) -> Result<GenerateResponse, Error> {
    let PreparedCall {
        adapter,
        model,
        context,
        options,
        warnings,
        request,
    } = prepared;

    let body = http::send_json(&request, options.timeout_ms(), model.max_retries).await?;

    let mut response = adapter.decode_response(body, &model)?;

    let mut full_context = context;
    full_context.push(response.message.clone());
    response.context = full_context;
    response.warnings = warnings;

    if let Some(cost) = model.cost.as_ref().map(|cost| response.usage.cost(cost)) {
        if cost > 0.0 {
            response
                .provider_meta
                .insert("cost".to_string(), serde_json::json!(cost));
        }
    }

    Ok(response)
}
