use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LLMError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::provider::retry::retry_after_from_headers;
use crate::provider::{LLMProvider, TextStream};
use crate::stream::collect_body_text;
use crate::types::{CapabilityDescriptor, QueryOptions, QueryRequest, QueryResponse};

use super::error::parse_gemini_error;
use super::request::{build_gemini_body, normalize_model};
use super::response::map_response;
use super::stream::create_stream;
use super::types::GeminiResponse;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_API_VERSION: &str = "v1beta";

/// Google Gemini adapter for the `generateContent` REST API.
pub struct GoogleGeminiProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) defaults: QueryOptions,
    pub(crate) timeout: Option<Duration>,
}

impl GoogleGeminiProvider {
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            defaults: QueryOptions::default(),
            timeout: None,
        }
    }

    /// Base URL without the API version; a trailing `/v1beta` is tolerated.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.defaults.model = Some(model.into());
        self
    }

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

    pub(crate) fn endpoint(&self, model: &str, stream: bool) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base
            .strip_suffix(DEFAULT_API_VERSION)
            .map(|rest| rest.trim_end_matches('/'))
            .unwrap_or(base);
        let model = normalize_model(model);
        if stream {
            format!("{base}/{DEFAULT_API_VERSION}/{model}:streamGenerateContent?alt=sse")
        } else {
            format!("{base}/{DEFAULT_API_VERSION}/{model}:generateContent")
        }
    }

    fn build_http_request(
        &self,
        request: &QueryRequest,
        stream: bool,
    ) -> Result<(HttpRequest, String), LLMError> {
        let options = request.options.or_defaults(&self.defaults);
        let model = options
            .model
            .clone()
            .ok_or_else(|| LLMError::validation("model is required for gemini"))?;
        let body = build_gemini_body(request, &options);
        let endpoint = self.endpoint(&model, stream);
        tracing::debug!(provider = self.name(), %endpoint, %model, stream, "dispatching request");
        let http_request = HttpRequest::post_json(endpoint.clone(), &body)?
            .with_header("x-goog-api-key", self.api_key.clone())
            .with_timeout(self.timeout);
        Ok((http_request, endpoint))
    }

    fn failure(&self, status: u16, headers: &HashMap<String, String>, body: &str) -> LLMError {
        tracing::warn!(provider = self.name(), status, "request rejected");
        parse_gemini_error(status, body, retry_after_from_headers(headers))
    }
}

#[async_trait]
impl LLMProvider for GoogleGeminiProvider {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, LLMError> {
        let (http_request, endpoint) = self.build_http_request(&request, false)?;
        let response = self.transport.send(http_request).await?;
        let status = response.status;
        let headers = response.headers.clone();
        let text = response.into_string()?;
        if !(200..300).contains(&status) {
            return Err(self.failure(status, &headers, &text));
        }
        let parsed: GeminiResponse = serde_json::from_str(&text).map_err(|err| {
            LLMError::provider(self.name(), format!("failed to parse response: {err}"))
        })?;
        Ok(map_response(parsed, self.name(), endpoint))
    }

    async fn stream(&self, request: QueryRequest) -> Result<TextStream, LLMError> {
        let (http_request, _) = self.build_http_request(&request, true)?;
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
            supports_json_mode: true,
        }
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
