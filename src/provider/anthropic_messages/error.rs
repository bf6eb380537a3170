use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LLMError, extract_model_identifier, looks_like_token_limit_error};

const PROVIDER: &str = "claude";

/// Parses error responses returned by the Anthropic Messages API.
///
/// Claude reports the category in `error.type` (`authentication_error`,
/// `overloaded_error`, ...); it doubles as the code hint when no `code` is present.
pub(crate) fn parse_anthropic_error(
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
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<Value>,
    }

    let Some(error) = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
    else {
        return LLMError::provider(PROVIDER, format!("status {status}: {body}"));
    };

    let code = error
        .code
        .as_ref()
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(error.kind);
    let mut message = error.message.unwrap_or_else(|| "unknown error".to_string());
    if let Some(code) = &code {
        message = format!("{message} ({code})");
    }
    let code_hint = code.as_deref();

    if looks_like_token_limit_error(code_hint, &message) {
        return LLMError::TokenLimitExceeded { message };
    }
    if status == 404 || matches!(code_hint, Some("not_found" | "not_found_error")) {
        return LLMError::ModelNotFound {
            model: extract_model_identifier(&message),
            message,
        };
    }

    match (status, code_hint) {
        (401 | 403, _) | (_, Some("authentication_error" | "permission_error")) => {
            LLMError::Auth { message }
        }
        (429 | 529, _) | (_, Some("rate_limit_error" | "overloaded_error")) => {
            LLMError::RateLimit {
                message,
                retry_after,
            }
        }
        (400 | 413, _) => LLMError::Validation { message },
        _ => LLMError::provider(PROVIDER, message),
    }
}
