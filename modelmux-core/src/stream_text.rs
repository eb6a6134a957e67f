use crate::http;
use crate::prepare::{prepare_chat, PreparedCall};
use crate::prompt::{ModelSpec, Prompt};
use crate::stream::{spawn, StreamJob, StreamResponse};
use modelmux_provider::{CallOptions, Error};

/// Stream an assistant response chunk by chunk.
///
/// Returns once the connection is established and the status line is
/// healthy; a non-2xx status surfaces here as the mapped API error
/// before any chunk exists. The returned [`StreamResponse`] yields
/// chunks lazily and resolves terminal metadata when the stream ends.
pub async fn stream_text(
    model: impl Into<ModelSpec>,
    prompt: impl Into<Prompt>,
    options: CallOptions,
) -> Result<StreamResponse, Error> {
    let prepared = prepare_chat(model, prompt, options, true)?;
    execute(prepared).await
}

pub(crate) async fn execute(prepared: PreparedCall) -> Result<StreamResponse, Error> {
    let PreparedCall {
        adapter,
        model,
        context,
        options,
        warnings,
        request,
    } = prepared;

    let byte_stream = http::connect_stream(&request, options.timeout_ms()).await?;

    Ok(spawn(
        StreamJob {
            adapter,
            model,
            context,
            warnings,
            receive_timeout_ms: options.receive_timeout_ms(),
        },
        byte_stream,
    ))
}
