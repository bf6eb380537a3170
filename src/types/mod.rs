//! Request and response values shared by every vendor adapter.
//!
//! A query is a single prompt with an optional system prompt; vendors differ only in how
//! they place those two strings on the wire.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LLMError;
use crate::json::{Template, extract_json};

const JSON_INSTRUCTION: &str =
    "Provide response in JSON format. Do not include any explanatory text outside the JSON.";

/// Shape of the answer a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Free-form text.
    #[default]
    Text,
    /// A JSON value, instructed through the prompt and parsed from the answer.
    Json,
}

/// Sampling knobs; unset fields fall back to the adapter defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Model identifier override.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum number of output tokens.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,
    /// Stop sequences.
    #[serde(default)]
    pub stop: Vec<String>,
    /// Vendor-specific fields merged into the request body verbatim.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

impl QueryOptions {
    /// Fills every unset field from `defaults`; `extra` entries from `self` win.
    pub fn or_defaults(&self, defaults: &QueryOptions) -> QueryOptions {
        let mut extra = defaults.extra.clone();
        extra.extend(self.extra.clone());
        QueryOptions {
            model: self.model.clone().or_else(|| defaults.model.clone()),
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            top_p: self.top_p.or(defaults.top_p),
            stop: if self.stop.is_empty() {
                defaults.stop.clone()
            } else {
                self.stop.clone()
            },
            extra,
        }
    }
}

/// A single prompt sent to one model.
///
/// # Examples
///
/// ```
/// use llmeasy::types::{OutputFormat, QueryRequest};
///
/// let request = QueryRequest::new("List three Rust web frameworks")
///     .with_system("You are concise.")
///     .with_output_format(OutputFormat::Json)
///     .with_temperature(0.2);
/// assert!(request.rendered_prompt().contains("JSON format"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// User prompt.
    pub prompt: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Sampling options.
    pub options: QueryOptions,
    /// Expected answer shape.
    pub output_format: OutputFormat,
    /// Shape the JSON answer must follow; rendered into the instruction and checked on parse.
    pub json_template: Option<Template>,
}

impl QueryRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Attaches a JSON shape and switches the request to [`OutputFormat::Json`].
    pub fn with_json_template(mut self, template: Template) -> Self {
        self.json_template = Some(template);
        self.output_format = OutputFormat::Json;
        self
    }

    /// Prompt text as sent to the vendor, including the JSON instruction when requested.
    pub fn rendered_prompt(&self) -> String {
        match self.output_format {
            OutputFormat::Text => self.prompt.clone(),
            OutputFormat::Json => {
                let mut prompt = format!("{}\n{JSON_INSTRUCTION}", self.prompt);
                if let Some(template) = &self.json_template {
                    let shape = serde_json::to_string_pretty(&template.to_value())
                        .unwrap_or_default();
                    prompt.push_str("\nFollow this structure:\n");
                    prompt.push_str(&shape);
                }
                prompt
            }
        }
    }
}

/// Token accounting reported by the vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    pub(crate) fn from_counts(prompt: Option<u64>, completion: Option<u64>) -> Self {
        Self {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt.zip(completion).map(|(p, c)| p + c),
        }
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other(String),
}

/// Where a response came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Adapter name such as `claude` or `mistral`.
    pub provider: String,
    /// Upstream response identifier.
    pub request_id: Option<String>,
    /// Endpoint the request was sent to.
    pub endpoint: Option<String>,
}

/// Complete answer to a [`QueryRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Concatenated answer text.
    pub text: String,
    /// Effective model reported by the vendor.
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
    pub provider: ProviderMetadata,
}

impl QueryResponse {
    /// Parses the answer text as JSON.
    ///
    /// The whole text is tried first, then the first balanced span inside it (with
    /// repair), so fenced or prose-wrapped answers still parse.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] when no JSON value can be recovered.
    ///
    /// # Examples
    ///
    /// ```
    /// use llmeasy::types::{ProviderMetadata, QueryResponse};
    ///
    /// let response = QueryResponse {
    ///     text: "```json\n{\"test\": true}\n```".into(),
    ///     model: None,
    ///     usage: None,
    ///     finish_reason: None,
    ///     provider: ProviderMetadata::default(),
    /// };
    /// assert_eq!(response.json().unwrap()["test"], true);
    /// ```
    pub fn json(&self) -> Result<Value, LLMError> {
        extract_json(&self.text, true).ok_or_else(|| {
            LLMError::validation(format!(
                "Invalid JSON response from {}: {}",
                self.provider.provider,
                preview(&self.text)
            ))
        })
    }

    /// Parses the answer as JSON and checks it against `template`.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] when parsing fails or the value does not match.
    pub fn json_matching(&self, template: &Template) -> Result<Value, LLMError> {
        let value = self.json()?;
        if template.matches(&value) {
            Ok(value)
        } else {
            Err(LLMError::validation(format!(
                "JSON response from {} does not match the requested template",
                self.provider.provider
            )))
        }
    }
}

fn preview(text: &str) -> &str {
    const LIMIT: usize = 120;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// What an adapter can do, used to filter handles at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Incremental text streaming.
    pub supports_stream: bool,
    /// A dedicated system prompt slot.
    pub supports_system_prompt: bool,
    /// A native JSON response mode in addition to prompt instructions.
    pub supports_json_mode: bool,
}
