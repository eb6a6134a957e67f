use crate::credentials;
use crate::http;
use crate::prompt::ModelSpec;
use crate::registry;
use modelmux_provider::{CallOptions, EmbedInput, EmbedResponse, Error, Operation};

/// Compute embedding vectors for one text or a batch.
pub async fn embed(
    model: impl Into<ModelSpec>,
    input: impl Into<EmbedInput>,
    options: CallOptions,
) -> Result<EmbedResponse, Error> {
    let registry = registry::global();

    let model = model.into().into_model()?;
    let adapter = registry.get(&model.provider)?;
    if !adapter
        .supported_operations()
        .contains(&Operation::Embedding)
    {
        return Err(Error::not_implemented(format!(
            "provider {} does not support embeddings",
            model.provider
        )));
    }

    let joined = registry.get_model(&model.provider, &model.model)?;
    let input = input.into();

    let (options, warnings) = adapter.translate_options(Operation::Embedding, &joined, options)?;
    for warning in &warnings {
        log::warn!("{}: {warning}", joined.provider);
    }

    let mut request = adapter.build_embed_request(&joined, &input, &options)?;
    if adapter.requires_api_key() {
        let (api_key, _source) = credentials::resolve(&registry, &joined.provider, &options)?;
        adapter.attach_credentials(&mut request, &api_key);
    }

    let body = http::send_json(&request, options.timeout_ms(), joined.max_retries).await?;
    let response = adapter.decode_embed_response(body, &joined)?;

    if response.embeddings.len() != input.len() {
        return Err(Error::parse(
            format!(
                "expected {} embeddings, provider returned {}",
                input.len(),
                response.embeddings.len()
            ),
            None,
        ));
    }

    Ok(response)
}

/// Cosine similarity of two equal-length vectors.
///
/// Empty or zero-magnitude inputs yield `0.0`; mismatched lengths are an
/// error. The result is clamped into `[-1, 1]` against floating-point
/// drift.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, Error> {
    if a.len() != b.len() {
        return Err(Error::invalid_parameter(format!(
            "vector lengths differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Ok(0.0);
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|y| y * y).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}
