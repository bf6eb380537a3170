use serde_json::{Map, Value, json};

use crate::error::LLMError;
use crate::types::{QueryOptions, QueryRequest};

/// Builds a Messages body; the system prompt goes to the top-level `system` field.
pub(crate) fn build_anthropic_body(
    request: &QueryRequest,
    options: &QueryOptions,
    model: &str,
    stream: bool,
) -> Result<Value, LLMError> {
    let max_tokens = options.max_tokens.ok_or_else(|| {
        LLMError::validation("Anthropic Messages requires max_tokens to be set")
    })?;

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert("max_tokens".to_string(), Value::from(max_tokens));
    body.insert(
        "messages".to_string(),
        json!([{"role": "user", "content": request.rendered_prompt()}]),
    );
    if let Some(system) = &request.system {
        body.insert("system".to_string(), Value::String(system.clone()));
    }
    if let Some(temperature) = options.temperature {
        body.insert("temperature".to_string(), Value::from(temperature));
    }
    if let Some(top_p) = options.top_p {
        body.insert("top_p".to_string(), Value::from(top_p));
    }
    if !options.stop.is_empty() {
        body.insert("stop_sequences".to_string(), json!(options.stop));
    }
    for (k, v) in &options.extra {
        body.insert(k.clone(), v.clone());
    }
    body.insert("stream".to_string(), Value::Bool(stream));
    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_is_top_level() {
        let request = QueryRequest::new("Name a crab").with_system("You are Ferris");
        let options = QueryOptions {
            max_tokens: Some(256),
            stop: vec!["\n\nHuman:".to_string()],
            ..Default::default()
        };
        let body = build_anthropic_body(&request, &options, "claude-3-sonnet-20240229", true)
            .expect("body");

        assert_eq!(body["system"], "You are Ferris");
        assert_eq!(
            body["messages"],
            json!([{"role": "user", "content": "Name a crab"}])
        );
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stop_sequences"], json!(["\n\nHuman:"]));
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn max_tokens_is_mandatory() {
        let err = build_anthropic_body(
            &QueryRequest::new("x"),
            &QueryOptions::default(),
            "claude",
            false,
        )
        .unwrap_err();
        assert!(matches!(err, LLMError::Validation { .. }));
    }
}
