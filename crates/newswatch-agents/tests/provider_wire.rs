//! Wire-level provider tests against a mock HTTP server.

use newswatch_agents::providers::{LlmProvider, LlmRequest, OpenAiProvider};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn openai_complete_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "deepseek-chat",
            "messages": [
                {"role": "system", "content": "be helpful"},
                {"role": "user", "content": "what changed?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": "nothing new"},
                "finish_reason": "stop"
            }],
            "model": "deepseek-chat",
            "usage": {"prompt_tokens": 9, "completion_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(
        "sk-test",
        Some("deepseek-chat".to_string()),
        Some(server.uri()),
    );

    let response = provider
        .complete(&LlmRequest::new("be helpful", "what changed?"))
        .await
        .expect("completion should succeed");

    assert_eq!(response.content, "nothing new");
    assert_eq!(response.model, "deepseek-chat");
    assert_eq!(response.usage.unwrap().output_tokens, 3);
}

#[tokio::test]
async fn health_check_maps_failures_to_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test", None, Some(server.uri()));
    assert!(!provider.health_check().await.unwrap());
}

#[tokio::test]
async fn openai_http_error_is_a_provider_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\": \"bad key\"}"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-bad", None, Some(server.uri()));
    let err = provider
        .complete(&LlmRequest::new("system", "user"))
        .await
        .expect_err("completion should fail");

    assert!(err.is_provider());
    assert!(err.to_string().contains("401"));
}
