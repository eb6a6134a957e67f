use crate::chat::decode_usage;
use modelmux_provider::{CallOptions, EmbedInput, EmbedResponse, Error, HttpRequest, Model};
use serde_json::{json, Map, Value};

pub fn build_embed_request(
    base_url: &str,
    model: &Model,
    input: &EmbedInput,
    options: &CallOptions,
) -> Result<HttpRequest, Error> {
    if input.is_empty() {
        return Err(Error::invalid_parameter("embedding input must be non-empty"));
    }

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model.model));
    body.insert("input".to_string(), serde_json::to_value(input).unwrap_or(Value::Null));
    body.insert("encoding_format".to_string(), json!("float"));

    if let Some(dimensions) = options.get("dimensions") {
        body.insert("dimensions".to_string(), dimensions.clone());
    }

    Ok(HttpRequest::post(
        format!("{base_url}/embeddings"),
        Value::Object(body),
    ))
}

pub fn decode_embed_response(body: Value, model: &Model) -> Result<EmbedResponse, Error> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::parse("embedding response has no data array", Some(body.to_string())))?;

    // Providers may return entries out of order; the index field is
    // authoritative.
    let mut indexed: Vec<(u64, Vec<f64>)> = data
        .iter()
        .map(|entry| {
            let index = entry["index"].as_u64().unwrap_or(0);
            let embedding = entry["embedding"]
                .as_array()
                .map(|values| values.iter().filter_map(Value::as_f64).collect())
                .ok_or_else(|| {
                    Error::parse("embedding entry has no embedding array", None)
                })?;
            Ok((index, embedding))
        })
        .collect::<Result<_, Error>>()?;
    indexed.sort_by_key(|(index, _)| *index);

    Ok(EmbedResponse {
        embeddings: indexed.into_iter().map(|(_, e)| e).collect(),
        model: body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(&model.model)
            .to_string(),
        usage: body.get("usage").map(decode_usage).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model::new("openai", "text-embedding-3-small")
    }

    #[test]
    fn builds_single_and_batch_input() {
        let request = build_embed_request(
            "https://api.openai.com/v1",
            &model(),
            &EmbedInput::from("hello"),
            &CallOptions::new(),
        )
        .unwrap();
        assert_eq!(request.url, "https://api.openai.com/v1/embeddings");
        assert_eq!(request.body["input"], "hello");

        let request = build_embed_request(
            "https://api.openai.com/v1",
            &model(),
            &EmbedInput::from(vec!["a".to_string(), "b".to_string()]),
            &CallOptions::new(),
        )
        .unwrap();
        assert_eq!(request.body["input"], json!(["a", "b"]));
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = build_embed_request(
            "https://api.openai.com/v1",
            &model(),
            &EmbedInput::Batch(Vec::new()),
            &CallOptions::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn decodes_and_reorders_by_index() {
        let body = json!({
            "model": "text-embedding-3-small",
            "data": [
                {"index": 1, "embedding": [0.3, 0.4]},
                {"index": 0, "embedding": [0.1, 0.2]}
            ],
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        });

        let response = decode_embed_response(body, &model()).unwrap();
        assert_eq!(response.embeddings[0], vec![0.1, 0.2]);
        assert_eq!(response.embeddings[1], vec![0.3, 0.4]);
        assert_eq!(response.usage.input_tokens, 4);
    }

    #[test]
    fn missing_data_is_a_parse_error() {
        let err = decode_embed_response(json!({"oops": true}), &model()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
