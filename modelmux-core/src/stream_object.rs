use crate::object::{apply_strategy, check_schema, choose_strategy, ObjectStream};
use crate::prepare::prepare_chat;
use crate::prompt::{ModelSpec, Prompt};
use crate::registry;
use modelmux_provider::{CallOptions, Error};
use serde_json::Value;

/// Stream a JSON-schema-constrained generation.
///
/// The returned [`ObjectStream`] forwards the underlying chunks (content
/// text in native mode, tool-argument fragments in fallback mode) and
/// assembles + validates the object once the stream terminates.
pub async fn stream_object(
    model: impl Into<ModelSpec>,
    prompt: impl Into<Prompt>,
    schema: Value,
    mut options: CallOptions,
) -> Result<ObjectStream, Error> {
    check_schema(&schema)?;

    let parsed = model.into().into_model()?;
    let adapter = registry::global().get(&parsed.provider)?;
    let strategy = choose_strategy(adapter.as_ref(), &parsed);
    apply_strategy(&mut options, &schema, strategy)?;

    let prepared = prepare_chat(parsed, prompt, options, true)?;
    let inner = crate::stream_text::execute(prepared).await?;

    Ok(ObjectStream::new(inner, schema, strategy))
}
