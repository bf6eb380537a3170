use serde_json::{Map, Value, json};

use crate::types::{OutputFormat, QueryOptions, QueryRequest};

/// Builds a `generateContent` body. The model travels in the URL, not the body.
pub(crate) fn build_gemini_body(request: &QueryRequest, options: &QueryOptions) -> Value {
    let mut body = Map::new();
    body.insert(
        "contents".to_string(),
        json!([{"role": "user", "parts": [{"text": request.rendered_prompt()}]}]),
    );
    if let Some(system) = &request.system {
        body.insert(
            "systemInstruction".to_string(),
            json!({"parts": [{"text": system}]}),
        );
    }

    let mut config = Map::new();
    if let Some(temperature) = options.temperature {
        config.insert("temperature".to_string(), Value::from(temperature));
    }
    if let Some(top_p) = options.top_p {
        config.insert("topP".to_string(), Value::from(top_p));
    }
    if let Some(max_tokens) = options.max_tokens {
        config.insert("maxOutputTokens".to_string(), Value::from(max_tokens));
    }
    if !options.stop.is_empty() {
        config.insert("stopSequences".to_string(), json!(options.stop));
    }
    if request.output_format == OutputFormat::Json {
        config.insert(
            "responseMimeType".to_string(),
            Value::String("application/json".to_string()),
        );
    }
    if !config.is_empty() {
        body.insert("generationConfig".to_string(), Value::Object(config));
    }

    for (k, v) in &options.extra {
        body.insert(k.clone(), v.clone());
    }
    Value::Object(body)
}

/// Accepts both `gemini-1.5-pro` and `models/gemini-1.5-pro`.
pub(crate) fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
