//! Minimal HTTP abstraction so adapters never talk to a concrete client.
//!
//! Adapters build an [`HttpRequest`] and hand it to a [`DynHttpTransport`]; tests swap in
//! an in-memory transport that replays canned bodies.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;

use crate::error::LLMError;

pub mod reqwest;

/// HTTP methods the adapters issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request handed to an [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Serializes `body` and builds a JSON POST.
    ///
    /// # Examples
    ///
    /// ```
    /// use llmeasy::http::{HttpMethod, HttpRequest};
    /// use serde_json::json;
    ///
    /// let request = HttpRequest::post_json("https://example.com", &json!({"ping": 1})).unwrap();
    /// assert_eq!(request.method, HttpMethod::Post);
    /// assert_eq!(request.headers["Content-Type"], "application/json");
    /// assert_eq!(request.body.as_deref(), Some(br#"{"ping":1}"#.as_slice()));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] when `body` cannot be serialized.
    pub fn post_json<T: Serialize + ?Sized>(
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, LLMError> {
        let payload = serde_json::to_vec(body)
            .map_err(|err| LLMError::validation(format!("failed to serialize request: {err}")))?;
        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: Some(payload),
            timeout: None,
        })
    }

    /// Adds or replaces one header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds every header in `headers`, replacing existing names.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Transport`] when the body is not valid UTF-8.
    pub fn into_string(self) -> Result<String, LLMError> {
        String::from_utf8(self.body).map_err(|err| LLMError::transport(err.to_string()))
    }
}

/// Alias for the body stream returned by [`HttpTransport::send_stream`].
pub type HttpBodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, LLMError>> + Send>>;

/// Response whose body arrives incrementally.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: HttpBodyStream,
}

impl HttpStreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests on behalf of the adapters.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use futures_util::stream;
/// use llmeasy::error::LLMError;
/// use llmeasy::http::{HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};
///
/// struct EchoTransport;
///
/// #[async_trait]
/// impl HttpTransport for EchoTransport {
///     async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
///         Ok(HttpResponse { status: 200, headers: request.headers, body: request.body.unwrap_or_default() })
///     }
///     async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
///         let body = request.body.unwrap_or_default();
///         Ok(HttpStreamResponse {
///             status: 200,
///             headers: request.headers,
///             body: Box::pin(stream::once(async move { Ok(body) })),
///         })
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let request = HttpRequest::post_json("https://example.com", &"hi").unwrap();
/// let response = EchoTransport.send(request).await.unwrap();
/// assert_eq!(response.into_string().unwrap(), "\"hi\"");
/// # });
/// ```
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and waits for the whole body.
    ///
    /// # Errors
    ///
    /// Network failures map to [`LLMError::Transport`]. Non-2xx statuses are returned as
    /// responses, not errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError>;

    /// Sends a request and returns as soon as the status line and headers arrive.
    ///
    /// # Errors
    ///
    /// Same contract as [`HttpTransport::send`].
    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            Err(ser::Error::custom("intentional serialization failure"))
        }
    }

    #[test]
    fn post_json_reports_serialization_failure() {
        match HttpRequest::post_json("http://example.com", &Unserializable) {
            Err(LLMError::Validation { message }) => {
                assert!(message.contains("failed to serialize request"), "{message}");
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected validation error"),
        }
    }

    #[test]
    fn header_helpers_merge_and_replace() {
        let request = HttpRequest::post_json("http://example.com", &1)
            .unwrap()
            .with_header("x-api-key", "one")
            .with_headers(HashMap::from([("x-api-key".to_string(), "two".to_string())]))
            .with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(request.headers["x-api-key"], "two");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn success_range_is_2xx() {
        let response = |status| HttpResponse {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(429).is_success());
    }
}
