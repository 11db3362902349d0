use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use mermaid_flow::completion::OpenAiClient;
use mermaid_flow_core::config::GenerationConfig;
use mermaid_flow_core::contract::{CompletionClient, DiagramRequest};
use mermaid_flow_core::error::CompletionError;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

/// Local stand-in for an OpenAI-compatible endpoint; records every request it gets.
async fn fake_endpoint(status: StatusCode, reply: Value) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let sink = sink.clone();
            let reply = reply.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                sink.lock().unwrap().push((auth, body));
                (status, Json(reply))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1/"), captured)
}

fn request_for(base: &str, temperature: Option<f32>) -> DiagramRequest {
    let config = GenerationConfig {
        endpoint_base_url: Some(base.to_string()),
        api_key: Some("sk-test".to_string()),
        model: None,
        temperature,
        prompt_template: Some("Draw: ".to_string()),
    };
    DiagramRequest::from_config(&config, "fn main() {}".to_string()).unwrap()
}

#[tokio::test]
async fn test_complete_sends_one_user_message_and_returns_first_choice() {
    let (base, captured) = fake_endpoint(
        StatusCode::OK,
        json!({
            "choices": [
                { "message": { "role": "assistant", "content": "graph TD\nA-->B" } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        }),
    )
    .await;

    let client = OpenAiClient::new();
    let result = client
        .complete(&request_for(&base, None))
        .await
        .expect("completion should succeed");

    assert_eq!(result.content.as_deref(), Some("graph TD\nA-->B"));

    let calls = captured.lock().unwrap();
    assert_eq!(calls.len(), 1, "exactly one call per request");
    let (auth, body) = &calls[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "deepseek-chat");
    assert!(body.get("temperature").is_none());
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "Draw: fn main() {}");
}

#[tokio::test]
async fn test_complete_forwards_temperature() {
    let (base, captured) =
        fake_endpoint(StatusCode::OK, json!({ "choices": [] })).await;

    let result = OpenAiClient::new()
        .complete(&request_for(&base, Some(0.25)))
        .await
        .unwrap();

    assert!(result.content.is_none(), "no choices means no content");
    let calls = captured.lock().unwrap();
    assert_eq!(calls[0].1["temperature"], 0.25);
}

#[tokio::test]
async fn test_complete_surfaces_endpoint_errors() {
    let (base, _captured) = fake_endpoint(
        StatusCode::UNAUTHORIZED,
        json!({ "error": { "message": "Incorrect API key provided" } }),
    )
    .await;

    let err = OpenAiClient::new()
        .complete(&request_for(&base, None))
        .await
        .unwrap_err();

    match err {
        CompletionError::Endpoint { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Incorrect API key provided"));
        }
        other => panic!("Expected endpoint error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_complete_surfaces_transport_errors() {
    let err = OpenAiClient::new()
        .complete(&request_for("http://127.0.0.1:9/v1", None))
        .await
        .unwrap_err();
    assert!(matches!(err, CompletionError::Transport(_)));
}
