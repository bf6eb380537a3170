use crate::types::{FinishReason, ProviderMetadata, QueryResponse, TokenUsage};

use super::types::OpenAiChatResponse;

pub(crate) fn map_response(
    resp: OpenAiChatResponse,
    provider: &'static str,
    endpoint: String,
) -> QueryResponse {
    let mut choices = resp.choices;
    choices.sort_by_key(|choice| choice.index);
    let first = choices.into_iter().next();

    let finish_reason = first
        .as_ref()
        .and_then(|choice| choice.finish_reason.as_deref())
        .map(convert_finish_reason);
    let text = first
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.into_text())
        .unwrap_or_default();

    QueryResponse {
        text,
        model: resp.model,
        usage: resp
            .usage
            .map(|usage| TokenUsage::from_counts(usage.prompt_tokens, usage.completion_tokens)),
        finish_reason,
        provider: ProviderMetadata {
            provider: provider.to_string(),
            request_id: resp.id,
            endpoint: Some(endpoint),
        },
    }
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" | "model_length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}
