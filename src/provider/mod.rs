//! Vendor adapters behind one capability trait.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::LLMError;
use crate::types::{CapabilityDescriptor, QueryRequest, QueryResponse};

pub mod anthropic_messages;
pub mod google_gemini;
pub mod openai_chat;
pub(crate) mod retry;

/// Answer text delivered fragment by fragment, in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>;

/// A model vendor that can answer a prompt whole or as a stream of text fragments.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Sends the request and waits for the complete answer.
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, LLMError>;

    /// Sends the request and yields answer text as it arrives.
    ///
    /// Fragments are arbitrary: a word, half a JSON key, several sentences.
    async fn stream(&self, request: QueryRequest) -> Result<TextStream, LLMError>;

    fn capabilities(&self) -> CapabilityDescriptor;

    /// Adapter name used in errors and logs.
    fn name(&self) -> &'static str;
}

/// Thread-safe provider handle.
pub type DynProvider = Arc<dyn LLMProvider>;
