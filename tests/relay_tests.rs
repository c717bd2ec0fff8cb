//! Relay service tests against a mock upstream

use httpmock::prelude::*;
use relaygate::config::Settings;
use relaygate::models::openai::{GeneralOpenAIRequest, ImageRequest, Message};
use relaygate::models::{ChannelType, Meta, Usage};
use relaygate::services::{RelayResponse, RelayService};
use serde_json::{json, Value};

fn service() -> RelayService {
    RelayService::from_settings(&Settings::default()).unwrap()
}

fn chat_request(model: &str, stream: bool) -> GeneralOpenAIRequest {
    GeneralOpenAIRequest {
        model: model.to_string(),
        messages: vec![Message::new("user", "Say hello")],
        stream,
        ..Default::default()
    }
}

fn chat_meta(channel_type: ChannelType, base_url: &str, stream: bool) -> Meta {
    Meta::new(channel_type, base_url, "sk-test", "/v1/chat/completions")
        .with_model("gpt-4o", "gpt-4o")
        .with_stream(stream)
        .with_prompt_tokens(10)
}

async fn collect_stream(response: RelayResponse) -> (Vec<String>, Usage) {
    let RelayResponse::Stream { mut frames, completion } = response else {
        panic!("expected a stream response");
    };

    let mut out = Vec::new();
    while let Some(frame) = frames.recv().await {
        out.push(String::from_utf8(frame.to_vec()).unwrap());
    }
    let usage = completion.await.unwrap().unwrap();
    (out, usage)
}

#[tokio::test]
async fn test_sync_chat_forwards_body_and_usage() {
    let server = MockServer::start_async().await;
    let upstream_body = json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
    });
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(upstream_body.clone());
        })
        .await;

    let meta = chat_meta(ChannelType::OpenAi, &server.base_url(), false);
    let response = service().relay_text(meta, chat_request("gpt-4o", false)).await.unwrap();

    mock.assert_async().await;
    match response {
        RelayResponse::Json { status, body, usage } => {
            assert_eq!(status, 200);
            let body: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body, upstream_body);
            assert_eq!(usage, Usage::new(10, 2));
        }
        RelayResponse::Stream { .. } => panic!("expected a JSON response"),
    }
}

#[tokio::test]
async fn test_upstream_error_status_passed_through() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).json_body(json!({
                "error": {"message": "Rate limit reached", "type": "rate_limit_error", "code": "rate_limit"}
            }));
        })
        .await;

    let meta = chat_meta(ChannelType::DeepSeek, &server.base_url(), false);
    let err = service()
        .relay_text(meta, chat_request("gpt-4o", false))
        .await
        .err()
        .unwrap();

    assert_eq!(err.status_code, 429);
    assert_eq!(err.error.message, "Rate limit reached");
    assert_eq!(err.error.error_type, "rate_limit_error");
}

#[tokio::test]
async fn test_undecodable_error_body_synthesized() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(503).body("<html>Service Unavailable</html>");
        })
        .await;

    let meta = chat_meta(ChannelType::OpenAi, &server.base_url(), false);
    let err = service()
        .relay_text(meta, chat_request("gpt-4o", false))
        .await
        .err()
        .unwrap();

    assert_eq!(err.status_code, 503);
    assert_eq!(err.error.message, "bad response status code 503");
    assert_eq!(err.error.code, Some(json!(503)));
}

#[tokio::test]
async fn test_invalid_request_never_reaches_upstream() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;

    let meta = chat_meta(ChannelType::OpenAi, &server.base_url(), false);
    let request = GeneralOpenAIRequest {
        model: "gpt-4o".to_string(),
        ..Default::default()
    };
    let err = service().relay_text(meta, request).await.err().unwrap();

    assert_eq!(err.status_code, 400);
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_transport_failure_is_bad_gateway() {
    let meta = chat_meta(ChannelType::OpenAi, "http://127.0.0.1:9", false);
    let err = service()
        .relay_text(meta, chat_request("gpt-4o", false))
        .await
        .err()
        .unwrap();

    assert_eq!(err.status_code, 502);
    assert_eq!(err.error.code, Some(json!("do_request_failed")));
}

#[tokio::test]
async fn test_native_stream_relayed_frame_by_frame() {
    let server = MockServer::start_async().await;
    let sse = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":2,\"total_tokens\":12}}\n\n",
        "data: [DONE]\n\n",
    );
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .json_body_partial(r#"{"stream": true, "stream_options": {"include_usage": true}}"#);
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(sse);
        })
        .await;

    let meta = chat_meta(ChannelType::OpenAi, &server.base_url(), true);
    let response = service().relay_text(meta, chat_request("gpt-4o", true)).await.unwrap();
    let (frames, usage) = collect_stream(response).await;

    mock.assert_async().await;
    assert_eq!(frames.len(), 4);
    assert!(frames[0].contains("Hel"));
    assert!(frames[1].contains("lo"));
    assert_eq!(frames[3], "data: [DONE]\n\n");
    assert_eq!(usage, Usage::new(10, 2));
}

#[tokio::test]
async fn test_stream_status_error_returned_before_frames() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(401).json_body(json!({"error": {"message": "Invalid API key", "type": "auth_error"}}));
        })
        .await;

    let meta = chat_meta(ChannelType::OpenAi, &server.base_url(), true);
    let err = service()
        .relay_text(meta, chat_request("gpt-4o", true))
        .await
        .err()
        .unwrap();

    assert_eq!(err.status_code, 401);
    assert_eq!(err.error.message, "Invalid API key");
}

#[tokio::test]
async fn test_refact_synthetic_stream() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("user-agent", "refact-lsp 0.10.19")
                .json_body_partial(r#"{"stream": false}"#);
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": "fn main() {}"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
            }));
        })
        .await;

    let meta = chat_meta(ChannelType::Refact, &server.base_url(), true);
    let response = service().relay_text(meta, chat_request("gpt-4.1", true)).await.unwrap();
    let (frames, usage) = collect_stream(response).await;

    mock.assert_async().await;
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1], "data: [DONE]\n\n");

    let chunk: Value = serde_json::from_str(frames[0].trim_start_matches("data: ").trim()).unwrap();
    assert_eq!(chunk["object"], "chat.completion.chunk");
    assert_eq!(chunk["choices"][0]["delta"]["content"], "fn main() {}");
    assert_eq!(chunk["choices"][0]["finish_reason"], "stop");
    assert_eq!(chunk["usage"]["total_tokens"], 14);
    assert_eq!(usage, Usage::new(10, 4));
}

#[tokio::test]
async fn test_refact_stream_decode_failure_returned_before_frames() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        })
        .await;

    let meta = chat_meta(ChannelType::Refact, &server.base_url(), true);
    let err = match service().relay_text(meta, chat_request("gpt-4.1", true)).await {
        Err(err) => err,
        Ok(_) => panic!("expected the decode failure before any stream is opened"),
    };

    assert_eq!(err.status_code, 500);
    assert_eq!(err.error.message, "failed to decode upstream response");
}

#[tokio::test]
async fn test_refact_stream_embedded_error_returned_as_json() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .json_body(json!({"error": {"message": "quota exceeded", "type": "insufficient_quota"}}));
        })
        .await;

    let meta = chat_meta(ChannelType::Refact, &server.base_url(), true);
    let err = match service().relay_text(meta, chat_request("gpt-4.1", true)).await {
        Err(err) => err,
        Ok(_) => panic!("expected the embedded error before any stream is opened"),
    };

    assert_eq!(err.status_code, 500);
    assert_eq!(err.error.message, "quota exceeded");
}

#[tokio::test]
async fn test_refact_sync_reshaped_to_chat_completion() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": "done"}}]
            }));
        })
        .await;

    let meta = chat_meta(ChannelType::Refact, &server.base_url(), false);
    let response = service().relay_text(meta, chat_request("gpt-4.1", false)).await.unwrap();

    let RelayResponse::Json { body, usage, .. } = response else {
        panic!("expected a JSON response");
    };
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "done");
    // Estimated: vendor sent no usage
    assert_eq!(usage.prompt_tokens, 10);
    assert!(usage.completion_tokens > 0);
    assert!(usage.is_consistent());
}

#[tokio::test]
async fn test_image_generation() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/images/generations");
            then.status(200)
                .json_body(json!({"created": 1, "data": [{"url": "https://img.example/cat.png"}]}));
        })
        .await;

    let meta = Meta::new(ChannelType::OpenAi, server.base_url(), "sk-test", "/v1/images/generations")
        .with_model("dall-e-3", "dall-e-3")
        .with_prompt_tokens(3);
    let request = ImageRequest {
        model: "dall-e-3".to_string(),
        prompt: "a cat".to_string(),
        ..Default::default()
    };

    let outcome = service().relay_image(meta, request).await.unwrap();
    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.usage, Usage::new(3, 0));
}

#[tokio::test]
async fn test_image_without_asset_is_no_content() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/images/generations");
            then.status(200).json_body(json!({"created": 1, "data": []}));
        })
        .await;

    let meta = Meta::new(ChannelType::OpenAi, server.base_url(), "sk-test", "/v1/images/generations")
        .with_model("dall-e-3", "dall-e-3");
    let request = ImageRequest {
        model: "dall-e-3".to_string(),
        prompt: "a cat".to_string(),
        ..Default::default()
    };

    let err = service().relay_image(meta, request).await.err().unwrap();
    assert_eq!(err.status_code, 502);
    assert_eq!(err.error.code, Some(json!("no_content_generated")));
}
