use crate::error::LLMError;
use crate::http::HttpBodyStream;
use crate::provider::TextStream;
use crate::stream::{Delta, text_stream};

use super::types::OpenAiStreamChunk;

pub(crate) fn create_stream(body: HttpBodyStream, provider: &'static str) -> TextStream {
    text_stream(body, provider, true, move |data| extract_delta(data, provider))
}

/// Pulls the first choice's content delta out of one `chat.completion.chunk` payload.
fn extract_delta(data: &str, provider: &'static str) -> Result<Delta, LLMError> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(data).map_err(|err| {
        LLMError::provider(provider, format!("failed to parse stream chunk: {err}"))
    })?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .map_or(Delta::Skip, |content| Delta::Text(content.into_text())))
}
