use std::time::Duration;

use thiserror::Error;

/// Every failure the client, the adapters and the template helpers can report.
///
/// Vendor error bodies are normalized into these variants, so `RateLimit` means the
/// same thing for Claude and Gemini. Per-span JSON failures inside the stream
/// assembler never show up here: they are dropped and logged instead.
#[derive(Debug, Error)]
pub enum LLMError {
    /// Connection, TLS, timeout or body read failure.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The vendor rejected the credential (HTTP 401/403 or an auth error type).
    #[error("authentication failed: {message}")]
    Auth { message: String },
    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        /// From the `Retry-After` header, when sent.
        retry_after: Option<Duration>,
    },
    /// Prompt plus completion do not fit the model's context window.
    #[error("token limit exceeded: {message}")]
    TokenLimitExceeded { message: String },
    /// Bad request parameters, or an answer that is not the JSON that was asked for.
    #[error("invalid request: {message}")]
    Validation { message: String },
    #[error("unsupported feature: {feature}")]
    UnsupportedFeature { feature: &'static str },
    #[error("model not found: {message}")]
    ModelNotFound {
        /// Identifier quoted in the vendor message, if any.
        model: Option<String>,
        message: String,
    },
    /// A setting failed to parse or is out of range.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
    /// A JSON shape template is malformed.
    #[error("invalid template at {path}: {reason}")]
    InvalidTemplate {
        /// Dotted path of the offending node (`$` for the root).
        path: String,
        reason: String,
    },
    /// A prompt template placeholder had no value.
    #[error("Missing required template variable: '{name}'")]
    MissingVariable { name: String },
    /// The event stream ended before the vendor's end marker.
    #[error("stream closed early: {message}")]
    StreamClosed { message: String },
    /// Vendor error that fits no other variant.
    #[error("{provider} returned an error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },
    #[error("unknown error: {message}")]
    Unknown { message: String },
}

impl LLMError {
    /// Shorthand for [`LLMError::Transport`].
    ///
    /// # Examples
    ///
    /// ```
    /// use llmeasy::error::LLMError;
    ///
    /// let err = LLMError::transport("dns lookup failed");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Shorthand for [`LLMError::Provider`].
    ///
    /// # Examples
    ///
    /// ```
    /// use llmeasy::error::LLMError;
    ///
    /// let err = LLMError::provider("openai", "bad JSON payload");
    /// assert!(matches!(err, LLMError::Provider { provider: "openai", .. }));
    /// ```
    pub fn provider<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::InvalidTemplate`] for the node at `path`.
    pub fn invalid_template(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`LLMError::Validation`] from a textual description.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Whether a vendor error code or message reports a context window overflow.
pub(crate) fn looks_like_token_limit_error(code_hint: Option<&str>, message: &str) -> bool {
    const CODES: [&str; 4] = [
        "context_length_exceeded",
        "max_context_length_exceeded",
        "prompt_tokens_exceeded",
        "context_window_exceeded",
    ];
    let code_matches = code_hint.is_some_and(|code| {
        let code = code.to_ascii_lowercase();
        CODES.contains(&code.as_str()) || code.contains("token")
    });
    if code_matches {
        return true;
    }

    let lower_message = message.to_ascii_lowercase();
    const HINTS: [&str; 7] = [
        "context length",
        "maximum number of tokens",
        "context window",
        "token limit",
        "maximum output tokens",
        "max output tokens",
        "prompt is too long",
    ];
    HINTS.iter().any(|needle| lower_message.contains(needle))
}

/// First quoted or backticked word in `message`, taken as the model name.
pub(crate) fn extract_model_identifier(message: &str) -> Option<String> {
    ['`', '"', '\'']
        .into_iter()
        .filter_map(|delimiter| between_delimiters(message, delimiter))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn between_delimiters(message: &str, delimiter: char) -> Option<&str> {
    let start = message.find(delimiter)? + delimiter.len_utf8();
    let rest = message.get(start..)?;
    let end = rest.find(delimiter)?;
    Some(&rest[..end])
}
