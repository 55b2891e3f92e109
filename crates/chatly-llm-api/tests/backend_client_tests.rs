use std::sync::Arc;

use chatly_llm_api::{
    AuditingTransport, BackendConfig, BackendError, BackendType, ChatBackend, ChatBackendClient,
    Completion, ReqwestTransport,
};
use chatly_logging::{AuditRecorder, HttpExchangeRecord};
use chatly_types::{Message, ToolDefinition};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEPLOYMENT: &str = "gpt-4o";
const API_KEY: &str = "test-api-key";

struct Harness {
    _dir: TempDir,
    log_path: std::path::PathBuf,
    client: ChatBackendClient,
}

fn harness(server: &MockServer, backend: BackendType) -> Harness {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("http-traffic.log");
    let recorder = AuditRecorder::new(&log_path, ["api-key", "authorization"]);
    let transport = AuditingTransport::new(Arc::new(ReqwestTransport::new().unwrap()), recorder);
    let config = BackendConfig::new(backend, server.uri(), API_KEY, DEPLOYMENT);
    Harness {
        _dir: dir,
        log_path,
        client: ChatBackendClient::new(Arc::new(transport), config),
    }
}

fn records(path: &std::path::Path) -> Vec<HttpExchangeRecord> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn weather_tool() -> ToolDefinition {
    ToolDefinition {
        name: "get_weather".to_string(),
        description: "Get the current weather for a given location".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {"location": {"type": "string"}},
            "required": ["location"]
        }),
    }
}

#[tokio::test]
async fn test_azure_request_shape_and_final_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/openai/deployments/{}/chat/completions", DEPLOYMENT)))
        .and(query_param("api-version", "2024-10-21"))
        .and(header("api-key", API_KEY))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "tool_choice": "auto"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi! How can I help?"},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, BackendType::AzureOpenAi);
    let completion = h
        .client
        .complete(&[Message::user("Hello")], &[weather_tool()])
        .await
        .unwrap();

    assert_eq!(completion, Completion::Final(Message::assistant("Hi! How can I help?")));

    let logged = records(&h.log_path);
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].status, Some(200));
    assert!(logged[0].request_headers.iter().all(|h| !h.name.eq_ignore_ascii_case("api-key")));
    assert!(!std::fs::read_to_string(&h.log_path).unwrap().contains(API_KEY));
}

#[tokio::test]
async fn test_openai_backend_uses_bearer_and_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", format!("Bearer {}", API_KEY).as_str()))
        .and(body_partial_json(json!({"model": DEPLOYMENT})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .mount(&server)
        .await;

    let h = harness(&server, BackendType::OpenAi);
    let completion = h
        .client
        .complete(&[Message::user("What's the weather in Paris?")], &[weather_tool()])
        .await
        .unwrap();

    match completion {
        Completion::ToolCalls { calls, .. } => {
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].id, "call_abc");
            assert_eq!(calls[0].name, "get_weather");
        }
        other => panic!("expected tool calls, got {:?}", other),
    }

    let raw = std::fs::read_to_string(&h.log_path).unwrap();
    assert!(!raw.contains(API_KEY));
    assert!(!raw.to_ascii_lowercase().contains("\"authorization\""));
}

#[tokio::test]
async fn test_server_error_is_unavailable_and_still_audited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
        .mount(&server)
        .await;

    let h = harness(&server, BackendType::AzureOpenAi);
    let err = h.client.complete(&[Message::user("Hello")], &[]).await.unwrap_err();

    match err {
        BackendError::Unavailable(msg) => {
            assert!(msg.contains("503"));
            assert!(msg.contains("upstream overloaded"));
        }
        other => panic!("expected Unavailable, got {:?}", other),
    }

    let logged = records(&h.log_path);
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].status, Some(503));
    assert_eq!(logged[0].response_body, "upstream overloaded");
}

#[tokio::test]
async fn test_malformed_body_is_response_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant"}, "finish_reason": "stop"}]
        })))
        .mount(&server)
        .await;

    let h = harness(&server, BackendType::AzureOpenAi);
    let err = h.client.complete(&[Message::user("Hello")], &[]).await.unwrap_err();
    assert!(matches!(err, BackendError::Response(_)));
    assert_eq!(records(&h.log_path).len(), 1);
}

#[tokio::test]
async fn test_unreachable_backend_is_unavailable_with_error_record() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("http-traffic.log");
    let recorder = AuditRecorder::new(&log_path, ["api-key"]);
    let transport = AuditingTransport::new(Arc::new(ReqwestTransport::new().unwrap()), recorder);
    let config = BackendConfig::new(BackendType::AzureOpenAi, "http://127.0.0.1:1", API_KEY, DEPLOYMENT);
    let client = ChatBackendClient::new(Arc::new(transport), config);

    let err = client.complete(&[Message::user("Hello")], &[]).await.unwrap_err();
    assert!(matches!(err, BackendError::Unavailable(_)));

    let logged = records(&log_path);
    assert_eq!(logged.len(), 1);
    assert!(logged[0].error.is_some());
    assert!(logged[0].response_body.is_empty());
}
