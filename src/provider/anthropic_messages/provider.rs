use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LLMError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::provider::retry::retry_after_from_headers;
use crate::provider::{LLMProvider, TextStream};
use crate::stream::collect_body_text;
use crate::types::{CapabilityDescriptor, QueryOptions, QueryRequest, QueryResponse};

use super::error::parse_anthropic_error;
use super::request::build_anthropic_body;
use super::response::map_response;
use super::stream::create_stream;
use super::types::AnthropicMessageResponse;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_VERSION: &str = "2023-06-01";

/// Claude adapter speaking the Anthropic Messages API.
pub struct AnthropicMessagesProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) version: String,
    pub(crate) defaults: QueryOptions,
    pub(crate) timeout: Option<Duration>,
}

impl AnthropicMessagesProvider {
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            version: DEFAULT_VERSION.to_string(),
            defaults: QueryOptions::default(),
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the `anthropic-version` header.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.defaults.model = Some(model.into());
        self
    }

    /// Options applied whenever a request leaves them unset. A model set earlier
    /// through [`Self::with_default_model`] survives when `defaults` has none.
    pub fn with_default_options(mut self, defaults: QueryOptions) -> Self {
        let model = self.defaults.model.take();
        self.defaults = defaults;
        if self.defaults.model.is_none() {
            self.defaults.model = model;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/messages")
        } else {
            format!("{base}/v1/messages")
        }
    }

    fn build_http_request(
        &self,
        request: &QueryRequest,
        stream: bool,
    ) -> Result<HttpRequest, LLMError> {
        let options = request.options.or_defaults(&self.defaults);
        let model = options
            .model
            .clone()
            .ok_or_else(|| LLMError::validation("model is required for claude"))?;
        let body = build_anthropic_body(request, &options, &model, stream)?;
        let endpoint = self.endpoint();
        tracing::debug!(provider = self.name(), %endpoint, %model, stream, "dispatching request");
        Ok(HttpRequest::post_json(endpoint, &body)?
            .with_header("x-api-key", self.api_key.clone())
            .with_header("anthropic-version", self.version.clone())
            .with_header(
                "Accept",
                if stream {
                    "text/event-stream"
                } else {
                    "application/json"
                },
            )
            .with_timeout(self.timeout))
    }

    fn failure(&self, status: u16, headers: &HashMap<String, String>, body: &str) -> LLMError {
        tracing::warn!(provider = self.name(), status, "request rejected");
        parse_anthropic_error(status, body, retry_after_from_headers(headers))
    }
}

#[async_trait]
impl LLMProvider for AnthropicMessagesProvider {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, LLMError> {
        let http_request = self.build_http_request(&request, false)?;
        let response = self.transport.send(http_request).await?;
        let status = response.status;
        let headers = response.headers.clone();
        let text = response.into_string()?;
        if !(200..300).contains(&status) {
            return Err(self.failure(status, &headers, &text));
        }
        let parsed: AnthropicMessageResponse = serde_json::from_str(&text).map_err(|err| {
            LLMError::provider(self.name(), format!("failed to parse response: {err}"))
        })?;
        Ok(map_response(parsed, self.name(), self.endpoint()))
    }

    async fn stream(&self, request: QueryRequest) -> Result<TextStream, LLMError> {
        let http_request = self.build_http_request(&request, true)?;
        let response = self.transport.send_stream(http_request).await?;
        if !response.is_success() {
            let text = collect_body_text(response.body, self.name()).await?;
            return Err(self.failure(response.status, &response.headers, &text));
        }
        Ok(create_stream(response.body, self.name()))
    }

    fn capabilities(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            supports_stream: true,
            supports_system_prompt: true,
            supports_json_mode: false,
        }
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}
