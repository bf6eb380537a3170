mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Canned, MockTransport, init_tracing};
use futures_util::StreamExt;
use llmeasy::provider::DynProvider;
use llmeasy::provider::anthropic_messages::AnthropicMessagesProvider;
use llmeasy::provider::google_gemini::GoogleGeminiProvider;
use llmeasy::provider::openai_chat::{OpenAiChatProvider, OpenAiVendor};
use llmeasy::types::FinishReason;
use llmeasy::{AssemblerConfig, LLMClient, LLMError, QueryRequest};
use serde_json::{Value, json};

fn client(handle: &str, provider: DynProvider) -> LLMClient {
    LLMClient::builder().register_handle(handle, provider).build()
}

async fn collect_text(client: &LLMClient, handle: &str, request: QueryRequest) -> String {
    client
        .stream(handle, request)
        .await
        .expect("stream")
        .map(|item| item.expect("fragment"))
        .collect::<Vec<_>>()
        .await
        .concat()
}

#[tokio::test]
async fn openai_query_maps_text_usage_and_headers() {
    init_tracing();
    let transport = MockTransport::new(vec![Canned::json(
        200,
        &json!({
            "id": "chatcmpl-9",
            "model": "gpt-4-turbo-preview",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        }),
    )]);
    let provider = OpenAiChatProvider::new(transport.dyn_transport(), "sk-test")
        .with_default_model("gpt-4-turbo-preview");
    let client = client("openai", Arc::new(provider));

    let response = client
        .query("openai", QueryRequest::new("Hello").with_system("Be nice"))
        .await
        .expect("response");
    assert_eq!(response.text, "Hi!");
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    assert_eq!(response.usage.and_then(|u| u.total_tokens), Some(7));
    assert_eq!(response.provider.provider, "openai");

    let requests = transport.requests();
    assert_eq!(requests[0].url, "https://api.openai.com/v1/chat/completions");
    assert_eq!(requests[0].headers["Authorization"], "Bearer sk-test");
    let body = transport.last_body();
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["stream"], false);
}

#[tokio::test]
async fn mistral_and_grok_share_the_chat_adapter() {
    init_tracing();
    let chunk = |text: &str| json!({"choices": [{"index": 0, "delta": {"content": text}}]}).to_string();
    let transport = MockTransport::new(vec![
        Canned::sse([chunk("Bon"), chunk("jour"), "[DONE]".to_string()]),
        Canned::json(
            401,
            &json!({"code": "invalid-api-key", "error": "Incorrect API key provided"}),
        ),
    ]);
    let mistral = OpenAiChatProvider::for_vendor(
        OpenAiVendor::Mistral,
        transport.dyn_transport(),
        "m-key",
    )
    .with_default_model("mistral-small-latest");
    let grok = OpenAiChatProvider::for_vendor(OpenAiVendor::Grok, transport.dyn_transport(), "x")
        .with_default_model("grok-beta");
    let client = LLMClient::builder()
        .register_handle("mistral", Arc::new(mistral) as DynProvider)
        .register_handle("grok", Arc::new(grok) as DynProvider)
        .build();

    assert_eq!(
        collect_text(&client, "mistral", QueryRequest::new("Salut")).await,
        "Bonjour"
    );
    match client.query("grok", QueryRequest::new("hi")).await {
        Err(LLMError::Auth { message }) => assert!(message.contains("Incorrect API key")),
        other => panic!("unexpected result: {other:?}"),
    }

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://api.mistral.ai/v1/chat/completions".to_string(),
            "https://api.x.ai/v1/chat/completions".to_string(),
        ]
    );
}

#[tokio::test]
async fn claude_stream_and_rate_limit() {
    init_tracing();
    let transport = MockTransport::new(vec![
        Canned::sse([
            json!({"type": "message_start", "message": {"id": "msg_1"}}).to_string(),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}).to_string(),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hello"}}).to_string(),
            json!({"type": "ping"}).to_string(),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": " there"}}).to_string(),
            json!({"type": "message_stop"}).to_string(),
        ]),
        Canned::json(
            429,
            &json!({"type": "error", "error": {"type": "rate_limit_error", "message": "Number of requests has exceeded your rate limit"}}),
        )
        .with_header("retry-after", "17"),
    ]);
    let provider = AnthropicMessagesProvider::new(transport.dyn_transport(), "sk-ant")
        .with_default_model("claude-3-sonnet-20240229");
    let client = client("claude", Arc::new(provider));
    let request = QueryRequest::new("Hi")
        .with_system("Answer briefly")
        .with_max_tokens(100);

    assert_eq!(
        collect_text(&client, "claude", request.clone()).await,
        "Hello there"
    );
    let body = transport.last_body();
    assert_eq!(body["system"], "Answer briefly");
    assert_eq!(body["max_tokens"], 100);

    match client.query("claude", request).await {
        Err(LLMError::RateLimit { retry_after, .. }) => {
            assert_eq!(retry_after, Some(Duration::from_secs(17)))
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn gemini_json_query_and_missing_model() {
    init_tracing();
    let transport = MockTransport::new(vec![
        Canned::json(
            200,
            &json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"colors\": [\"red\", \"blue\"]}"}]}, "finishReason": "STOP"}],
                "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 6, "totalTokenCount": 14}
            }),
        ),
        Canned::json(
            404,
            &json!({"error": {"code": 404, "message": "models/gemini-0 is not found for API version v1beta", "status": "NOT_FOUND"}}),
        ),
    ]);
    let provider = GoogleGeminiProvider::new(transport.dyn_transport(), "g-key")
        .with_default_model("gemini-1.5-flash");
    let client = client("gemini", Arc::new(provider));

    let value = client
        .query_json("gemini", QueryRequest::new("Two colors"))
        .await
        .expect("json");
    assert_eq!(value, json!({"colors": ["red", "blue"]}));
    let body = transport.last_body();
    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(
        transport.requests()[0].url,
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
    );

    let missing = client
        .query(
            "gemini",
            QueryRequest::new("x").with_model("gemini-0"),
        )
        .await;
    assert!(matches!(missing, Err(LLMError::ModelNotFound { .. })));
}

#[tokio::test]
async fn stream_json_over_sse_fragments() {
    init_tracing();
    let pieces = [
        "Sure! {\"name\": \"Ru",
        "st\", \"year\": 2015}\n{\"name\": \"Go\", ",
        "\"year\": 2009} done",
    ];
    let transport = MockTransport::new(vec![Canned::sse(
        pieces
            .iter()
            .map(|p| json!({"choices": [{"index": 0, "delta": {"content": p}}]}).to_string())
            .chain(["[DONE]".to_string()]),
    )]);
    let provider = OpenAiChatProvider::new(transport.dyn_transport(), "sk")
        .with_default_model("gpt-4-turbo-preview");
    let client = client("openai", Arc::new(provider));
    let config = AssemblerConfig::default()
        .with_template_value(&json!({"name": "string", "year": "number"}))
        .expect("template");

    let values: Vec<Value> = client
        .stream_json("openai", QueryRequest::new("Languages"), &config)
        .await
        .expect("stream")
        .map(|item| item.expect("value"))
        .collect()
        .await;
    assert_eq!(
        values,
        vec![
            json!({"name": "Rust", "year": 2015}),
            json!({"name": "Go", "year": 2009})
        ]
    );

    let body = transport.last_body();
    assert_eq!(body["stream"], true);
    assert_eq!(body["response_format"], json!({"type": "json_object"}));
}

#[tokio::test]
async fn upstream_stream_errors_reach_the_consumer() {
    init_tracing();
    let transport = MockTransport::new(vec![Canned::sse([
        json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "{\"a\": 1}"}}).to_string(),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}).to_string(),
    ])]);
    let provider = AnthropicMessagesProvider::new(transport.dyn_transport(), "k")
        .with_default_model("claude-3-haiku-20240307");
    let client = client("claude", Arc::new(provider));

    let items: Vec<Result<Value, LLMError>> = client
        .stream_json(
            "claude",
            QueryRequest::new("x").with_max_tokens(10),
            &AssemblerConfig::default(),
        )
        .await
        .expect("stream")
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().ok(), Some(&json!({"a": 1})));
    assert!(matches!(items[1], Err(LLMError::RateLimit { .. })));
}
