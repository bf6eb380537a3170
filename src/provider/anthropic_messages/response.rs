use crate::types::{FinishReason, ProviderMetadata, QueryResponse, TokenUsage};

use super::types::AnthropicMessageResponse;

pub(crate) fn map_response(
    resp: AnthropicMessageResponse,
    provider: &'static str,
    endpoint: String,
) -> QueryResponse {
    let text = resp
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    QueryResponse {
        text,
        model: resp.model,
        usage: resp
            .usage
            .map(|usage| TokenUsage::from_counts(usage.input_tokens, usage.output_tokens)),
        finish_reason: resp.stop_reason.as_deref().map(convert_finish_reason),
        provider: ProviderMetadata {
            provider: provider.to_string(),
            request_id: resp.id,
            endpoint: Some(endpoint),
        },
    }
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "refusal" => FinishReason::ContentFilter,
        other => FinishReason::Other(other.to_string()),
    }
}
