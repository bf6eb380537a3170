use crate::error::LLMError;
use crate::http::HttpBodyStream;
use crate::provider::TextStream;
use crate::stream::{Delta, text_stream};

use super::types::AnthropicStreamEvent;

pub(crate) fn create_stream(body: HttpBodyStream, provider: &'static str) -> TextStream {
    text_stream(body, provider, true, move |data| extract_delta(data, provider))
}

/// Maps one Messages stream event: text deltas carry content, `message_stop` ends the
/// answer and `error` events abort it.
fn extract_delta(data: &str, provider: &'static str) -> Result<Delta, LLMError> {
    let event: AnthropicStreamEvent = serde_json::from_str(data).map_err(|err| {
        LLMError::provider(provider, format!("failed to parse stream event: {err}"))
    })?;
    match event.kind.as_str() {
        "content_block_delta" => Ok(event
            .delta
            .filter(|delta| delta.kind.as_deref().is_none_or(|kind| kind == "text_delta"))
            .and_then(|delta| delta.text)
            .map_or(Delta::Skip, Delta::Text)),
        "message_stop" => Ok(Delta::Stop),
        "error" => {
            let error = event.error;
            let kind = error
                .as_ref()
                .and_then(|e| e.kind.clone())
                .unwrap_or_else(|| "error".to_string());
            let message = error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "stream error".to_string());
            if kind == "overloaded_error" || kind == "rate_limit_error" {
                Err(LLMError::RateLimit {
                    message: format!("{message} ({kind})"),
                    retry_after: None,
                })
            } else {
                Err(LLMError::provider(provider, format!("{message} ({kind})")))
            }
        }
        _ => Ok(Delta::Skip),
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{StreamExt, stream};

    use super::*;

    #[test]
    fn only_text_deltas_contribute() {
        let text = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Once"}}"#;
        assert_eq!(
            extract_delta(text, "claude").unwrap(),
            Delta::Text("Once".to_string())
        );
        let json = r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"a\""}}"#;
        assert_eq!(extract_delta(json, "claude").unwrap(), Delta::Skip);
        let ping = r#"{"type":"ping"}"#;
        assert_eq!(extract_delta(ping, "claude").unwrap(), Delta::Skip);
    }

    #[test]
    fn error_events_abort() {
        let overloaded = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(matches!(
            extract_delta(overloaded, "claude"),
            Err(LLMError::RateLimit { .. })
        ));
        let other = r#"{"type":"error","error":{"type":"api_error","message":"Internal"}}"#;
        match extract_delta(other, "claude") {
            Err(LLMError::Provider { provider, message }) => {
                assert_eq!(provider, "claude");
                assert!(message.contains("Internal"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_stops_at_message_stop() {
        let sse = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" world\"}}\n\n",
            "event: message_delta\n",
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":2}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        let body: HttpBodyStream = Box::pin(stream::iter(vec![Ok(sse.as_bytes().to_vec())]));
        let texts: Vec<String> = create_stream(body, "claude")
            .map(|item| item.expect("text"))
            .collect()
            .await;
        assert_eq!(texts, vec!["Hello".to_string(), " world".to_string()]);
    }
}
