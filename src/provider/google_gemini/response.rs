use crate::types::{FinishReason, ProviderMetadata, QueryResponse, TokenUsage};

use super::types::GeminiResponse;

pub(crate) fn map_response(
    resp: GeminiResponse,
    provider: &'static str,
    endpoint: String,
) -> QueryResponse {
    let text = resp.first_text().unwrap_or_default();
    let finish_reason = resp
        .candidates
        .first()
        .and_then(|candidate| candidate.finish_reason.as_deref())
        .map(convert_finish_reason)
        .or_else(|| {
            resp.prompt_feedback
                .as_ref()
                .and_then(|feedback| feedback.block_reason.as_ref())
                .map(|_| FinishReason::ContentFilter)
        });
    let usage = resp.usage_metadata.map(|usage| {
        let mut mapped =
            TokenUsage::from_counts(usage.prompt_token_count, usage.candidates_token_count);
        if usage.total_token_count.is_some() {
            mapped.total_tokens = usage.total_token_count;
        }
        mapped
    });

    QueryResponse {
        text,
        model: resp.model_version,
        usage,
        finish_reason,
        provider: ProviderMetadata {
            provider: provider.to_string(),
            request_id: resp.response_id,
            endpoint: Some(endpoint),
        },
    }
}

pub(crate) fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::ContentFilter
        }
        other => FinishReason::Other(other.to_string()),
    }
}
