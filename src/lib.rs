//! Unified access to several LLM vendors plus incremental extraction of JSON values
//! from streamed model output.
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use llmeasy::config::Settings;
//! use llmeasy::types::QueryRequest;
//!
//! # async fn run() -> Result<(), llmeasy::LLMError> {
//! let settings = Settings::from_env()?;
//! let client = settings.build_client()?;
//! let request = QueryRequest::new("List three programming languages as JSON objects");
//! let mut objects = client
//!     .stream_json("openai", request, &settings.assembler_config())
//!     .await?;
//! while let Some(object) = objects.next().await {
//!     println!("{}", object?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod json;
pub mod prompt;
pub mod provider;
pub mod stream;
pub mod types;

pub use client::LLMClient;
pub use config::Settings;
pub use error::LLMError;
pub use json::{AssemblerConfig, JsonObjectStream, JsonStreamAssembler, Template};
pub use prompt::PromptTemplate;
pub use provider::{LLMProvider, TextStream};
pub use types::{OutputFormat, QueryOptions, QueryRequest, QueryResponse};
