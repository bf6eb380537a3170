#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use futures_util::stream;
use llmeasy::LLMError;
use llmeasy::http::{
    DynHttpTransport, HttpBodyStream, HttpRequest, HttpResponse, HttpStreamResponse,
    HttpTransport,
};
use serde_json::Value;

/// Installs a test subscriber once; `RUST_LOG=llmeasy=debug` shows library events.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Canned {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub chunks: Vec<Vec<u8>>,
}

impl Canned {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            chunks: vec![body.to_string().into_bytes()],
        }
    }

    /// One SSE event per payload, each delivered as its own chunk.
    pub fn sse<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            status: 200,
            headers: HashMap::new(),
            chunks: payloads
                .into_iter()
                .map(|payload| format!("data: {}\n\n", payload.as_ref()).into_bytes())
                .collect(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

/// Records every request and replays canned responses in order.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Canned>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new(responses: Vec<Canned>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn dyn_transport(self: &Arc<Self>) -> DynHttpTransport {
        self.clone()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn last_body(&self) -> Value {
        let requests = self.requests();
        let request = requests.last().expect("a request was sent");
        serde_json::from_slice(request.body.as_deref().expect("body")).expect("json body")
    }

    fn next(&self, request: HttpRequest) -> Result<Canned, LLMError> {
        self.requests.lock().expect("lock").push(request);
        self.responses
            .lock()
            .expect("lock")
            .pop_front()
            .ok_or_else(|| LLMError::transport("no canned response left"))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        let canned = self.next(request)?;
        Ok(HttpResponse {
            status: canned.status,
            headers: canned.headers,
            body: canned.chunks.concat(),
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
        let canned = self.next(request)?;
        let body: HttpBodyStream = Box::pin(stream::iter(
            canned.chunks.into_iter().map(Ok::<_, LLMError>),
        ));
        Ok(HttpStreamResponse {
            status: canned.status,
            headers: canned.headers,
            body,
        })
    }
}
