use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LLMError;
use crate::http::{DynHttpTransport, HttpRequest};
use crate::provider::retry::retry_after_from_headers;
use crate::provider::{LLMProvider, TextStream};
use crate::stream::collect_body_text;
use crate::types::{CapabilityDescriptor, QueryOptions, QueryRequest, QueryResponse};

use super::error::parse_openai_error;
use super::request::build_openai_body;
use super::response::map_response;
use super::stream::create_stream;
use super::types::OpenAiChatResponse;

/// Vendors speaking the Chat Completions wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiVendor {
    OpenAi,
    Mistral,
    Grok,
}

impl OpenAiVendor {
    /// Provider name reported in responses, errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Mistral => "mistral",
            Self::Grok => "grok",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Mistral => "https://api.mistral.ai",
            Self::Grok => "https://api.x.ai",
        }
    }

    /// Whether `response_format: json_object` is sent for JSON output.
    fn supports_json_mode(self) -> bool {
        matches!(self, Self::OpenAi | Self::Mistral)
    }
}

/// Chat Completions adapter for OpenAI, Mistral and Grok.
pub struct OpenAiChatProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) vendor: OpenAiVendor,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) defaults: QueryOptions,
    pub(crate) timeout: Option<Duration>,
}

impl OpenAiChatProvider {
    /// Creates an OpenAI adapter with the default base URL.
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self::for_vendor(OpenAiVendor::OpenAi, transport, api_key)
    }

    /// Creates an adapter for any compatible vendor with its default base URL.
    pub fn for_vendor(
        vendor: OpenAiVendor,
        transport: DynHttpTransport,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            vendor,
            base_url: vendor.default_base_url().to_string(),
            api_key: api_key.into(),
            defaults: QueryOptions::default(),
            timeout: None,
        }
    }

    /// Points the adapter at a proxy or self-hosted compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.defaults.model = Some(model.into());
        self
    }

    /// Options applied whenever a request leaves them unset.
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
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn build_http_request(
        &self,
        request: &QueryRequest,
        stream: bool,
    ) -> Result<HttpRequest, LLMError> {
        let options = request.options.or_defaults(&self.defaults);
        let model = options.model.clone().ok_or_else(|| {
            LLMError::validation(format!("model is required for {}", self.vendor.name()))
        })?;
        let body: Value = build_openai_body(
            request,
            &options,
            &model,
            self.vendor.supports_json_mode(),
            stream,
        );
        let endpoint = self.endpoint();
        tracing::debug!(provider = self.name(), %endpoint, %model, stream, "dispatching request");
        Ok(HttpRequest::post_json(endpoint, &body)?
            .with_header("Authorization", format!("Bearer {}", self.api_key))
            .with_header("Accept", "application/json")
            .with_timeout(self.timeout))
    }

    fn failure(&self, status: u16, headers: &HashMap<String, String>, body: &str) -> LLMError {
        tracing::warn!(provider = self.name(), status, "request rejected");
        parse_openai_error(self.name(), status, body, retry_after_from_headers(headers))
    }
}

#[async_trait]
impl LLMProvider for OpenAiChatProvider {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, LLMError> {
        let http_request = self.build_http_request(&request, false)?;
        let response = self.transport.send(http_request).await?;
        let status = response.status;
        let headers = response.headers.clone();
        let text = response.into_string()?;
        if !(200..300).contains(&status) {
            return Err(self.failure(status, &headers, &text));
        }
        let parsed: OpenAiChatResponse = serde_json::from_str(&text).map_err(|err| {
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
            supports_json_mode: self.vendor.supports_json_mode(),
        }
    }

    fn name(&self) -> &'static str {
        self.vendor.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, HttpStreamResponse, HttpTransport};
    use std::sync::Arc;

    struct NoopTransport;

    #[async_trait]
    impl HttpTransport for NoopTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, LLMError> {
            Err(LLMError::transport("offline"))
        }

        async fn send_stream(&self, _request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
            Err(LLMError::transport("offline"))
        }
    }

    #[test]
    fn vendor_presets_pick_base_url_and_name() {
        let mistral = OpenAiChatProvider::for_vendor(
            OpenAiVendor::Mistral,
            Arc::new(NoopTransport),
            "key",
        );
        assert_eq!(mistral.name(), "mistral");
        assert_eq!(mistral.endpoint(), "https://api.mistral.ai/v1/chat/completions");

        let grok = OpenAiChatProvider::for_vendor(OpenAiVendor::Grok, Arc::new(NoopTransport), "k")
            .with_base_url("https://proxy.local/v1/");
        assert_eq!(grok.endpoint(), "https://proxy.local/v1/chat/completions");
        assert!(!grok.capabilities().supports_json_mode);
    }

    #[test]
    fn request_carries_bearer_auth_and_defaults() {
        let provider = OpenAiChatProvider::new(Arc::new(NoopTransport), "sk-test")
            .with_default_options(QueryOptions {
                max_tokens: Some(1000),
                ..Default::default()
            })
            .with_default_model("gpt-4-turbo-preview")
            .with_timeout(Duration::from_secs(9));
        let request = provider
            .build_http_request(&QueryRequest::new("hi"), false)
            .expect("request");
        assert_eq!(request.headers["Authorization"], "Bearer sk-test");
        assert_eq!(request.timeout, Some(Duration::from_secs(9)));
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap_or_default())
            .expect("json body");
        assert_eq!(body["model"], "gpt-4-turbo-preview");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[tokio::test]
    async fn missing_model_is_a_validation_error() {
        let provider = OpenAiChatProvider::new(Arc::new(NoopTransport), "sk-test");
        match provider.query(QueryRequest::new("hi")).await {
            Err(LLMError::Validation { message }) => assert!(message.contains("model")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
