use crate::error::LLMError;
use crate::http::HttpBodyStream;
use crate::provider::TextStream;
use crate::stream::{Delta, text_stream};

use super::types::GeminiResponse;

/// Streams `streamGenerateContent?alt=sse`; Gemini sends no `[DONE]`, so the answer
/// ends when the connection closes.
pub(crate) fn create_stream(body: HttpBodyStream, provider: &'static str) -> TextStream {
    text_stream(body, provider, false, move |data| extract_delta(data, provider))
}

fn extract_delta(data: &str, provider: &'static str) -> Result<Delta, LLMError> {
    let chunk: GeminiResponse = serde_json::from_str(data).map_err(|err| {
        LLMError::provider(provider, format!("failed to parse stream chunk: {err}"))
    })?;
    if chunk.candidates.is_empty() {
        if let Some(reason) = chunk
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return Err(LLMError::provider(
                provider,
                format!("prompt blocked: {reason}"),
            ));
        }
    }
    Ok(chunk.first_text().map_or(Delta::Skip, Delta::Text))
}
