use std::collections::HashMap;

use serde_json::Value;

use crate::error::LLMError;
use crate::json::{AssemblerConfig, JsonObjectStream, JsonStreamAssembler};
use crate::prompt::PromptTemplate;
use crate::provider::{DynProvider, TextStream};
use crate::types::{CapabilityDescriptor, OutputFormat, QueryRequest, QueryResponse};

/// Entry point holding the registered providers by handle.
pub struct LLMClient {
    providers: HashMap<String, DynProvider>,
}

impl LLMClient {
    pub fn builder() -> LLMClientBuilder {
        LLMClientBuilder {
            providers: HashMap::new(),
        }
    }

    /// Sends a complete query and returns the raw answer.
    pub async fn query(
        &self,
        handle: &str,
        request: QueryRequest,
    ) -> Result<QueryResponse, LLMError> {
        let provider = self.get_provider(handle)?;
        provider.query(request).await
    }

    /// Asks for JSON output and parses the answer.
    ///
    /// A template attached to the request is also enforced on the parsed value.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] when the answer is not JSON or does not match
    /// the template, besides any provider error.
    pub async fn query_json(&self, handle: &str, request: QueryRequest) -> Result<Value, LLMError> {
        let request = request.with_output_format(OutputFormat::Json);
        let template = request.json_template.clone();
        let response = self.query(handle, request).await?;
        match &template {
            Some(template) => response.json_matching(template),
            None => response.json(),
        }
    }

    /// Renders `template` with `vars` into the request prompt, then queries.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::MissingVariable`] before anything is sent when a placeholder
    /// has no value.
    pub async fn query_template<I, K, V>(
        &self,
        handle: &str,
        template: &PromptTemplate,
        vars: I,
        mut request: QueryRequest,
    ) -> Result<QueryResponse, LLMError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let provider = self.get_provider(handle)?;
        request.prompt = template.format(vars)?;
        provider.query(request).await
    }

    /// Opens a text stream.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::UnsupportedFeature`] when the provider cannot stream.
    pub async fn stream(&self, handle: &str, request: QueryRequest) -> Result<TextStream, LLMError> {
        let provider = self.get_streaming_provider(handle)?;
        provider.stream(request).await
    }

    /// Streams the answer through a [`JsonStreamAssembler`] and yields complete JSON
    /// values as soon as they close.
    ///
    /// The request is switched to JSON output. When `config` carries no template, the
    /// request's own template (if any) is used.
    pub async fn stream_json(
        &self,
        handle: &str,
        request: QueryRequest,
        config: &AssemblerConfig,
    ) -> Result<JsonObjectStream<TextStream>, LLMError> {
        let (assembler, upstream) = self.open_json_stream(handle, request, config).await?;
        Ok(assembler.process_stream(upstream))
    }

    /// Like [`stream_json`](Self::stream_json), dropping values rejected by `validator`.
    pub async fn stream_json_with<F>(
        &self,
        handle: &str,
        request: QueryRequest,
        config: &AssemblerConfig,
        validator: F,
    ) -> Result<JsonObjectStream<TextStream>, LLMError>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let (assembler, upstream) = self.open_json_stream(handle, request, config).await?;
        Ok(assembler.process_stream_with(upstream, validator))
    }

    /// Registered handles, sorted.
    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<String> = self.providers.keys().cloned().collect();
        handles.sort();
        handles
    }

    pub fn capabilities(&self, handle: &str) -> Result<CapabilityDescriptor, LLMError> {
        let provider = self.get_provider(handle)?;
        Ok(provider.capabilities())
    }

    /// Handles whose provider can stream, sorted.
    pub fn handles_supporting_stream(&self) -> Vec<String> {
        let mut handles: Vec<String> = self
            .providers
            .iter()
            .filter(|(_, provider)| provider.capabilities().supports_stream)
            .map(|(handle, _)| handle.clone())
            .collect();
        handles.sort();
        handles
    }

    async fn open_json_stream(
        &self,
        handle: &str,
        request: QueryRequest,
        config: &AssemblerConfig,
    ) -> Result<(JsonStreamAssembler, TextStream), LLMError> {
        let provider = self.get_streaming_provider(handle)?;
        let mut config = config.clone();
        if config.template.is_none() {
            config.template = request.json_template.clone();
        }
        let request = request.with_output_format(OutputFormat::Json);
        let upstream = provider.stream(request).await?;
        Ok((JsonStreamAssembler::new(config), upstream))
    }

    fn get_streaming_provider(&self, handle: &str) -> Result<DynProvider, LLMError> {
        let provider = self.get_provider(handle)?;
        if !provider.capabilities().supports_stream {
            return Err(LLMError::UnsupportedFeature { feature: "stream" });
        }
        Ok(provider)
    }

    fn get_provider(&self, handle: &str) -> Result<DynProvider, LLMError> {
        self.providers
            .get(handle)
            .cloned()
            .ok_or_else(|| LLMError::validation(format!("unknown model handle: {handle}")))
    }
}

pub struct LLMClientBuilder {
    providers: HashMap<String, DynProvider>,
}

impl LLMClientBuilder {
    /// Registers `provider` under `handle`, replacing any previous registration.
    pub fn register_handle<S: Into<String>>(mut self, handle: S, provider: DynProvider) -> Self {
        self.providers.insert(handle.into(), provider);
        self
    }

    pub fn build(self) -> LLMClient {
        LLMClient {
            providers: self.providers,
        }
    }
}
