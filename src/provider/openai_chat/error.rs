use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LLMError, extract_model_identifier, looks_like_token_limit_error};

/// Parses error bodies from OpenAI-compatible servers.
///
/// OpenAI nests `{"error": {"message", "code"}}`, Mistral puts `message` at the top level
/// (or `detail` for request validation), and xAI sends `{"code", "error": "<text>"}`.
pub(crate) fn parse_openai_error(
    provider: &'static str,
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<Value>,
        message: Option<String>,
        detail: Option<Value>,
        code: Option<Value>,
    }

    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return LLMError::provider(provider, format!("status {status}: {body}"));
    };

    let (message, code) = match parsed.error {
        Some(Value::Object(inner)) => (
            inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            inner.get("code").or_else(|| inner.get("type")).and_then(code_text),
        ),
        Some(Value::String(text)) => (Some(text), parsed.code.as_ref().and_then(code_text)),
        _ => (
            parsed
                .message
                .or_else(|| parsed.detail.map(|detail| detail_text(&detail))),
            parsed.code.as_ref().and_then(code_text),
        ),
    };

    let Some(mut message) = message else {
        return LLMError::provider(provider, format!("status {status}: {body}"));
    };
    if let Some(code) = &code {
        message = format!("{message} ({code})");
    }
    let code_hint = code.as_deref();

    if looks_like_token_limit_error(code_hint, &message) {
        return LLMError::TokenLimitExceeded { message };
    }
    if status == 404 || code_hint == Some("model_not_found") {
        return LLMError::ModelNotFound {
            model: extract_model_identifier(&message),
            message,
        };
    }

    match status {
        401 | 403 => LLMError::Auth { message },
        429 => LLMError::RateLimit {
            message,
            retry_after,
        },
        400 | 422 => LLMError::Validation { message },
        _ => LLMError::provider(provider, message),
    }
}

fn code_text(code: &Value) -> Option<String> {
    match code {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn detail_text(detail: &Value) -> String {
    match detail {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_nested_errors() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error", "code": "invalid_api_key"}}"#;
        match parse_openai_error("openai", 401, body, None) {
            LLMError::Auth { message } => {
                assert!(message.contains("Incorrect API key provided"));
                assert!(message.contains("invalid_api_key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let body = r#"{"error": {"message": "This model's maximum context length is 8192 tokens", "code": "context_length_exceeded"}}"#;
        assert!(matches!(
            parse_openai_error("openai", 400, body, None),
            LLMError::TokenLimitExceeded { .. }
        ));

        let body = r#"{"error": {"message": "The model `gpt-9` does not exist", "code": "model_not_found"}}"#;
        match parse_openai_error("openai", 404, body, None) {
            LLMError::ModelNotFound { model, .. } => assert_eq!(model.as_deref(), Some("gpt-9")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rate_limit_keeps_retry_after() {
        let body = r#"{"error": {"message": "Rate limit reached", "code": "rate_limit_exceeded"}}"#;
        match parse_openai_error("openai", 429, body, Some(Duration::from_secs(4))) {
            LLMError::RateLimit {
                message,
                retry_after,
            } => {
                assert!(message.contains("Rate limit reached"));
                assert_eq!(retry_after, Some(Duration::from_secs(4)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn mistral_top_level_and_detail_errors() {
        let body = r#"{"object": "error", "message": "Unauthorized", "type": "unauthorized", "code": "1000"}"#;
        assert!(matches!(
            parse_openai_error("mistral", 401, body, None),
            LLMError::Auth { .. }
        ));

        let body = r#"{"detail": [{"loc": ["body", "temperature"], "msg": "Input should be less than or equal to 1"}]}"#;
        match parse_openai_error("mistral", 422, body, None) {
            LLMError::Validation { message } => {
                assert!(message.contains("less than or equal to 1"), "{message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn grok_string_errors_and_fallback() {
        let body = r#"{"code": "Some requested entity was not found", "error": "The model grok-9 does not exist"}"#;
        assert!(matches!(
            parse_openai_error("grok", 404, body, None),
            LLMError::ModelNotFound { .. }
        ));

        match parse_openai_error("grok", 502, "bad gateway", None) {
            LLMError::Provider { provider, message } => {
                assert_eq!(provider, "grok");
                assert_eq!(message, "status 502: bad gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
