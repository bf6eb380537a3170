use std::time::Duration;

use serde::Deserialize;

use crate::error::{LLMError, extract_model_identifier, looks_like_token_limit_error};

const PROVIDER: &str = "gemini";

/// Parses Google RPC style errors: `{"error": {"code", "message", "status"}}`.
pub(crate) fn parse_gemini_error(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> LLMError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }

    #[derive(Deserialize)]
    struct InnerError {
        message: Option<String>,
        status: Option<String>,
    }

    let Some(error) = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
    else {
        return LLMError::provider(PROVIDER, format!("status {status}: {body}"));
    };

    let mut message = error.message.unwrap_or_else(|| "unknown error".to_string());
    let status_hint = error.status.as_deref().filter(|text| !text.is_empty());
    if let Some(text) = status_hint {
        message = format!("{message} ({text})");
    }

    if looks_like_token_limit_error(status_hint, &message) {
        return LLMError::TokenLimitExceeded { message };
    }
    if status == 404 || status_hint == Some("NOT_FOUND") {
        return LLMError::ModelNotFound {
            model: extract_model_identifier(&message),
            message,
        };
    }

    match (status, status_hint) {
        (401 | 403, _) | (_, Some("UNAUTHENTICATED" | "PERMISSION_DENIED")) => {
            LLMError::Auth { message }
        }
        (429, _) | (_, Some("RESOURCE_EXHAUSTED")) => LLMError::RateLimit {
            message,
            retry_after,
        },
        (400, _) | (_, Some("INVALID_ARGUMENT" | "FAILED_PRECONDITION")) => {
            LLMError::Validation { message }
        }
        _ => LLMError::provider(PROVIDER, message),
    }
}
