//! Settings and declarative provider configuration.
//!
//! [`Settings`] is read once from the environment (or any key lookup) and validated;
//! it then describes one [`ModelConfig`] per vendor whose API key is present.
//! [`build_client_from_configs`] turns such configs into an [`LLMClient`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::LLMClient;
use crate::error::LLMError;
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::json::AssemblerConfig;
use crate::provider::DynProvider;
use crate::provider::anthropic_messages::AnthropicMessagesProvider;
use crate::provider::google_gemini::GoogleGeminiProvider;
use crate::provider::openai_chat::{OpenAiChatProvider, OpenAiVendor};
use crate::types::QueryOptions;

/// One callable backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name the client registers the backend under, e.g. `claude`.
    pub handle: String,
    pub provider: ProviderKind,
    pub credential: Credential,
    pub default_model: Option<String>,
    pub base_url: Option<String>,
    /// Vendor specific settings. `version` overrides the Anthropic API version; every
    /// other entry is sent as an extra body field.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    OpenAi,
    Gemini,
    Mistral,
    Grok,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Mistral => "mistral",
            Self::Grok => "grok",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Self::Claude),
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "mistral" => Ok(Self::Mistral),
            "grok" | "xai" => Ok(Self::Grok),
            other => Err(LLMError::validation(format!(
                "unsupported provider: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// Plain API key; `header` is informational, each adapter uses its own header.
    ApiKey { header: Option<String>, key: String },
    Bearer { token: String },
    /// Google service account JSON. Not supported by the REST adapters.
    ServiceAccount { json: Value },
    None,
}

/// Builds a client registering every config under its handle.
///
/// # Errors
///
/// Returns [`LLMError::Auth`] naming the provider when a credential is missing or
/// cannot be used by that provider.
pub fn build_client_from_configs(
    configs: &[ModelConfig],
    transport: DynHttpTransport,
) -> Result<LLMClient, LLMError> {
    build_client_with(configs, transport, &QueryOptions::default(), None)
}

fn build_client_with(
    configs: &[ModelConfig],
    transport: DynHttpTransport,
    defaults: &QueryOptions,
    timeout: Option<Duration>,
) -> Result<LLMClient, LLMError> {
    let mut builder = LLMClient::builder();
    for config in configs {
        let provider = build_provider_from_config(config, transport.clone(), defaults, timeout)?;
        builder = builder.register_handle(config.handle.clone(), provider);
    }
    Ok(builder.build())
}

fn build_provider_from_config(
    config: &ModelConfig,
    transport: DynHttpTransport,
    defaults: &QueryOptions,
    timeout: Option<Duration>,
) -> Result<DynProvider, LLMError> {
    let api_key = extract_api_key(&config.credential, config.provider)?;
    let mut extra = config.extra.clone();
    let version = match config.provider {
        ProviderKind::Claude => extra.remove("version"),
        _ => None,
    };
    let mut defaults = defaults.clone();
    defaults.model = config.default_model.clone().or(defaults.model);
    defaults.extra.extend(extra);

    let provider: DynProvider = match config.provider {
        ProviderKind::Claude => {
            let mut provider =
                AnthropicMessagesProvider::new(transport, api_key).with_default_options(defaults);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(Value::String(version)) = version {
                provider = provider.with_version(version);
            }
            if let Some(timeout) = timeout {
                provider = provider.with_timeout(timeout);
            }
            Arc::new(provider)
        }
        ProviderKind::Gemini => {
            let mut provider =
                GoogleGeminiProvider::new(transport, api_key).with_default_options(defaults);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(timeout) = timeout {
                provider = provider.with_timeout(timeout);
            }
            Arc::new(provider)
        }
        ProviderKind::OpenAi | ProviderKind::Mistral | ProviderKind::Grok => {
            let vendor = match config.provider {
                ProviderKind::Mistral => OpenAiVendor::Mistral,
                ProviderKind::Grok => OpenAiVendor::Grok,
                _ => OpenAiVendor::OpenAi,
            };
            let mut provider = OpenAiChatProvider::for_vendor(vendor, transport, api_key)
                .with_default_options(defaults);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            if let Some(timeout) = timeout {
                provider = provider.with_timeout(timeout);
            }
            Arc::new(provider)
        }
    };

    Ok(provider)
}

fn extract_api_key(credential: &Credential, provider: ProviderKind) -> Result<String, LLMError> {
    match credential {
        Credential::ApiKey { key, .. } if !key.is_empty() => Ok(key.clone()),
        Credential::Bearer { token } if !token.is_empty() => Ok(token.clone()),
        Credential::ServiceAccount { .. } => Err(LLMError::Auth {
            message: format!("provider {provider} does not support service account credential"),
        }),
        _ => Err(LLMError::Auth {
            message: format!("provider {provider} requires credential"),
        }),
    }
}

pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-sonnet-20240229";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_MISTRAL_MODEL: &str = "mistral-small-latest";
pub const DEFAULT_GROK_MODEL: &str = "grok-beta";

/// Validated, immutable library settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub mistral_api_key: Option<String>,
    pub grok_api_key: Option<String>,
    pub claude_model: String,
    pub openai_model: String,
    pub gemini_model: String,
    pub mistral_model: String,
    pub grok_model: String,
    pub max_tokens: u32,
    /// Sampling temperature in `0.0..=1.0`.
    pub temperature: f32,
    pub timeout: Duration,
    pub json_repair: bool,
    /// Assembler buffer ceiling in bytes.
    pub max_buffer_size: usize,
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::InvalidConfig`] naming the first invalid variable.
    pub fn from_env() -> Result<Self, LLMError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; empty values count as unset.
    ///
    /// ```
    /// use llmeasy::config::Settings;
    ///
    /// let settings = Settings::from_lookup(|key| match key {
    ///     "OPENAI_API_KEY" => Some("sk-test".to_string()),
    ///     "TEMPERATURE" => Some("0.2".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(settings.temperature, 0.2);
    /// assert_eq!(settings.max_tokens, 1000);
    /// assert_eq!(settings.model_configs().len(), 1);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LLMError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let max_tokens: u32 = parse_number(&get, "MAX_TOKENS", 1000)?;
        if max_tokens == 0 {
            return Err(invalid("MAX_TOKENS", "must be positive"));
        }
        let temperature: f32 = parse_number(&get, "TEMPERATURE", 0.7)?;
        if !(0.0..=1.0).contains(&temperature) {
            return Err(invalid("TEMPERATURE", "must be between 0.0 and 1.0"));
        }
        let timeout_secs: u64 = parse_number(&get, "TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(invalid("TIMEOUT_SECS", "must be positive"));
        }
        let max_buffer_size: usize = parse_number(&get, "MAX_BUFFER_SIZE", 10_000)?;
        if max_buffer_size == 0 {
            return Err(invalid("MAX_BUFFER_SIZE", "must be positive"));
        }
        let json_repair = match get("JSON_REPAIR") {
            None => true,
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                invalid("JSON_REPAIR", &format!("expected a boolean, got {raw:?}"))
            })?,
        };

        Ok(Self {
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            google_api_key: get("GOOGLE_API_KEY"),
            mistral_api_key: get("MISTRAL_API_KEY"),
            grok_api_key: get("GROK_API_KEY"),
            claude_model: text("CLAUDE_MODEL", DEFAULT_CLAUDE_MODEL),
            openai_model: text("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            gemini_model: text("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            mistral_model: text("MISTRAL_MODEL", DEFAULT_MISTRAL_MODEL),
            grok_model: text("GROK_MODEL", DEFAULT_GROK_MODEL),
            max_tokens,
            temperature,
            timeout: Duration::from_secs(timeout_secs),
            json_repair,
            max_buffer_size,
        })
    }

    /// One config per vendor with a key, handled by the vendor name.
    pub fn model_configs(&self) -> Vec<ModelConfig> {
        let vendors = [
            (ProviderKind::Claude, &self.anthropic_api_key, &self.claude_model),
            (ProviderKind::OpenAi, &self.openai_api_key, &self.openai_model),
            (ProviderKind::Gemini, &self.google_api_key, &self.gemini_model),
            (ProviderKind::Mistral, &self.mistral_api_key, &self.mistral_model),
            (ProviderKind::Grok, &self.grok_api_key, &self.grok_model),
        ];
        vendors
            .into_iter()
            .filter_map(|(provider, key, model)| {
                let key = key.as_ref()?;
                Some(ModelConfig {
                    handle: provider.as_str().to_string(),
                    provider,
                    credential: Credential::ApiKey {
                        header: None,
                        key: key.clone(),
                    },
                    default_model: Some(model.clone()),
                    base_url: None,
                    extra: HashMap::new(),
                })
            })
            .collect()
    }

    /// Options every request falls back to.
    pub fn query_defaults(&self) -> QueryOptions {
        QueryOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig::default()
            .with_max_buffer_size(self.max_buffer_size)
            .with_repair_json(self.json_repair)
    }

    /// Builds a client over `transport` for every configured vendor, applying the
    /// query defaults and timeout.
    pub fn build_client_with_transport(
        &self,
        transport: DynHttpTransport,
    ) -> Result<LLMClient, LLMError> {
        build_client_with(
            &self.model_configs(),
            transport,
            &self.query_defaults(),
            Some(self.timeout),
        )
    }

    /// Like [`build_client_with_transport`](Self::build_client_with_transport) over
    /// the default reqwest transport.
    pub fn build_client(&self) -> Result<LLMClient, LLMError> {
        self.build_client_with_transport(default_dyn_transport(self.timeout)?)
    }
}

fn parse_number<T, F>(get: &F, key: &str, default: T) -> Result<T, LLMError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| invalid(key, &format!("{raw:?}: {err}"))),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(field: &str, reason: &str) -> LLMError {
    LLMError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
