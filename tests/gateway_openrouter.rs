use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use discernus::gateway::{
    GatewayError, OpenRouterGateway, RetryingGateway, ScoringGateway,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn test_gateway(server: &MockServer) -> OpenRouterGateway {
    OpenRouterGateway::with_config("sk-test", server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn openrouter_parses_content_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": "{\"hope\": 0.8, \"fear\": 0.2}" }
            }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 15 }
        })))
        .mount(&server)
        .await;

    let gateway = test_gateway(&server);
    let (text, meta) = gateway.execute_call("test/model", "score this").await.unwrap();

    assert_eq!(text, "{\"hope\": 0.8, \"fear\": 0.2}");
    assert!(meta.success);
    assert_eq!(meta.model, "test/model");
    assert_eq!(meta.input_tokens, 120);
    assert_eq!(meta.output_tokens, 15);
}

#[tokio::test]
async fn openrouter_requests_json_mode_at_zero_temperature() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "{}" } }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let gateway = test_gateway(&server);
    gateway.execute_call("test/model", "score this").await.unwrap();

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], "test/model");
    assert_eq!(body["temperature"], 0.0);
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["messages"][0]["role"], "user");
}

#[tokio::test]
async fn openrouter_detects_refusal_from_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "I cannot score that request." } }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let err = test_gateway(&server)
        .execute_call("test/model", "score this")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Refused(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn openrouter_missing_usage_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "{}" } }]
        })))
        .mount(&server)
        .await;

    let err = test_gateway(&server)
        .execute_call("test/model", "score this")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MissingUsage));
}

#[tokio::test]
async fn openrouter_classifies_429_and_5xx_as_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "rate limited", "code": "rate_limit_exceeded" }
        })))
        .mount(&server)
        .await;

    let err = test_gateway(&server)
        .execute_call("test/model", "score this")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.code(), "provider_error");
}

#[tokio::test]
async fn openrouter_4xx_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "message": "unknown model", "code": "model_not_found" }
        })))
        .mount(&server)
        .await;

    let err = test_gateway(&server)
        .execute_call("bad/model", "score this")
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[derive(Clone)]
struct FlipResponder {
    calls: Arc<AtomicUsize>,
    first: ResponseTemplate,
    second: ResponseTemplate,
}

impl Respond for FlipResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            self.first.clone()
        } else {
            self.second.clone()
        }
    }
}

#[tokio::test]
async fn retrying_gateway_recovers_from_transient_5xx() {
    let server = MockServer::start().await;

    let first = ResponseTemplate::new(500).set_body_json(json!({
        "error": { "message": "transient error", "code": "internal" }
    }));
    let second = ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "content": "{\"hope\": 0.5}" } }],
        "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
    }));

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(FlipResponder {
            calls: Arc::new(AtomicUsize::new(0)),
            first,
            second,
        })
        .mount(&server)
        .await;

    let gateway = RetryingGateway::with_config(
        test_gateway(&server),
        discernus::gateway::GatewayConfig {
            max_retries: 1,
            retry_base_delay: Duration::from_millis(0),
        },
    );

    let (text, _meta) = gateway.execute_call("test/model", "score this").await.unwrap();
    assert_eq!(text, "{\"hope\": 0.5}");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
}
