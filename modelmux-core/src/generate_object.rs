use crate::object::{
    apply_strategy, check_schema, choose_strategy, extract_object, validate_object, ObjectResponse,
};
use crate::prepare::prepare_chat;
use crate::prompt::{ModelSpec, Prompt};
use crate::registry;
use modelmux_provider::{CallOptions, Error};
use serde_json::Value;

/// Generate a JSON object conforming to `schema`.
///
/// Uses the provider's native JSON-schema response format when available
/// and falls back to a forced `structured_output` tool call otherwise.
/// The extracted object is validated against the schema before being
/// returned; a mismatch yields [`Error::SchemaValidation`] carrying the
/// partial text.
pub async fn generate_object(
    model: impl Into<ModelSpec>,
    prompt: impl Into<Prompt>,
    schema: Value,
    mut options: CallOptions,
) -> Result<ObjectResponse, Error> {
    check_schema(&schema)?;

    let parsed = model.into().into_model()?;
    let adapter = registry::global().get(&parsed.provider)?;
    let strategy = choose_strategy(adapter.as_ref(), &parsed);
    apply_strategy(&mut options, &schema, strategy)?;

    let prepared = prepare_chat(parsed, prompt, options, false)?;
    let response = crate::generate_text::execute(prepared).await?;

    let object = extract_object(&response, strategy)?;
    validate_object(&object, &schema)?;

    Ok(ObjectResponse { response, object })
}
