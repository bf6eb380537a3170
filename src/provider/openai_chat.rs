//! OpenAI Chat Completions adapter.
//!
//! Mistral and xAI Grok expose the same wire format, so they are served by this adapter
//! through [`OpenAiVendor`] presets that only change the base URL, the reported provider
//! name and whether native JSON mode is requested.

mod error;
mod provider;
mod request;
mod response;
mod stream;
mod types;

pub use provider::{OpenAiChatProvider, OpenAiVendor};
