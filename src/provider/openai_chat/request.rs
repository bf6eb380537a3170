use serde_json::{Map, Value, json};

use crate::types::{OutputFormat, QueryOptions, QueryRequest};

/// Builds a Chat Completions body; the system prompt becomes a leading `system` message.
pub(crate) fn build_openai_body(
    request: &QueryRequest,
    options: &QueryOptions,
    model: &str,
    json_mode: bool,
    stream: bool,
) -> Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": request.rendered_prompt()}));

    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(model.to_string()));
    body.insert("messages".to_string(), Value::Array(messages));
    if let Some(temperature) = options.temperature {
        body.insert("temperature".to_string(), Value::from(temperature));
    }
    if let Some(top_p) = options.top_p {
        body.insert("top_p".to_string(), Value::from(top_p));
    }
    if let Some(max_tokens) = options.max_tokens {
        body.insert("max_tokens".to_string(), Value::from(max_tokens));
    }
    if !options.stop.is_empty() {
        body.insert("stop".to_string(), json!(options.stop));
    }
    if json_mode && request.output_format == OutputFormat::Json {
        body.insert(
            "response_format".to_string(),
            json!({"type": "json_object"}),
        );
    }
    for (k, v) in &options.extra {
        body.insert(k.clone(), v.clone());
    }
    body.insert("stream".to_string(), Value::Bool(stream));
    Value::Object(body)
}
