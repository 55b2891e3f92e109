use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatly_chat::{ConversationSession, InputOutcome, SessionConfig, SessionState, TurnError};
use chatly_llm_api::{
    AuditingTransport, BackendConfig, BackendError, BackendType, ChatBackend, ChatBackendClient,
    Completion, HttpRequest, HttpResponse, HttpTransport, TransportError,
};
use chatly_logging::{AuditRecorder, HttpExchangeRecord};
use chatly_toolcore::{param, ParameterDefinition, Tool, ToolParameters, ToolRegistry};
use chatly_tools::{register_default_tools, WEATHER_CONDITIONS};
use chatly_types::{Message, Role, ToolDefinition, ToolInvocationRequest};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Replays canned completions and keeps a copy of every history it was sent
#[derive(Default)]
struct ScriptedBackend {
    script: Mutex<VecDeque<Result<Completion, BackendError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    fn new(script: Vec<Result<Completion, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn history_sent(&self, call: usize) -> Vec<Message> {
        self.seen.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, history: &[Message], _tools: &[ToolDefinition]) -> Result<Completion, BackendError> {
        self.seen.lock().unwrap().push(history.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Unavailable("script exhausted".to_string())))
    }
}

struct HangingBackend;

#[async_trait]
impl ChatBackend for HangingBackend {
    async fn complete(&self, _: &[Message], _: &[ToolDefinition]) -> Result<Completion, BackendError> {
        std::future::pending().await
    }
}

/// Echoes its `text` argument, or fails when asked to
struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back"
    }

    fn parameters(&self) -> HashMap<String, ParameterDefinition> {
        HashMap::from([param!("text", "string", "Text to echo", required)])
    }

    async fn execute(&self, params: ToolParameters) -> anyhow::Result<String> {
        let text: String = params.get_required("text")?;
        if text == "fail" {
            anyhow::bail!("echo refused");
        }
        Ok(text)
    }
}

fn final_answer(text: &str) -> Result<Completion, BackendError> {
    Ok(Completion::Final(Message::assistant(text)))
}

fn tool_calls(calls: &[(&str, &str, &str)]) -> Result<Completion, BackendError> {
    Ok(Completion::ToolCalls {
        content: String::new(),
        calls: calls
            .iter()
            .map(|(id, name, args)| ToolInvocationRequest::new(*id, *name, *args))
            .collect(),
    })
}

fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_default_tools(&mut registry).unwrap();
    registry.register(EchoTool).unwrap();
    Arc::new(registry)
}

fn session_with(backend: Arc<dyn ChatBackend>, config: SessionConfig) -> ConversationSession {
    ConversationSession::new(backend, registry(), config)
}

async fn run_turn(session: &mut ConversationSession, line: &str) -> Result<Message, TurnError> {
    assert_eq!(session.submit_user_input(line).unwrap(), InputOutcome::Accepted);
    let result = session.advance(&CancellationToken::new()).await;
    session.complete_display();
    result
}

#[tokio::test]
async fn test_history_grows_with_each_completed_turn() {
    let backend = ScriptedBackend::new(vec![final_answer("Hello!"), final_answer("Bye!")]);
    let mut session = session_with(backend.clone(), SessionConfig::default());

    let answer = run_turn(&mut session, "Hi").await.unwrap();
    assert_eq!(answer, Message::assistant("Hello!"));
    assert_eq!(session.history().len(), 3);

    run_turn(&mut session, "See you").await.unwrap();
    assert_eq!(session.turn_count(), 2);

    let roles: Vec<_> = session.history().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
    );

    // Full history is resent every call
    assert_eq!(backend.history_sent(1).len(), 4);
}

#[tokio::test]
async fn test_displaying_session_accepts_next_input_directly() {
    let backend = ScriptedBackend::new(vec![final_answer("one"), final_answer("two")]);
    let mut session = session_with(backend, SessionConfig::default());

    session.submit_user_input("first").unwrap();
    session.advance(&CancellationToken::new()).await.unwrap();
    assert_eq!(session.state(), SessionState::Displaying);

    assert_eq!(session.submit_user_input("second").unwrap(), InputOutcome::Accepted);
    assert_eq!(session.state(), SessionState::Processing);
}

#[tokio::test]
async fn test_tool_results_follow_requests_in_order_before_next_call() {
    let backend = ScriptedBackend::new(vec![
        tool_calls(&[
            ("call_1", "echo", r#"{"text":"first"}"#),
            ("call_2", "echo", r#"{"text":"second"}"#),
        ]),
        final_answer("done"),
    ]);
    let mut session = session_with(backend.clone(), SessionConfig::default());

    run_turn(&mut session, "echo twice").await.unwrap();

    let second_call = backend.history_sent(1);
    let tail: Vec<_> = second_call[2..]
        .iter()
        .map(|m| (m.role, m.tool_call_id.clone(), m.content.clone()))
        .collect();
    assert_eq!(
        tail,
        vec![
            (Role::Assistant, None, String::new()),
            (Role::Tool, Some("call_1".to_string()), "first".to_string()),
            (Role::Tool, Some("call_2".to_string()), "second".to_string()),
        ]
    );
    assert_eq!(second_call[2].tool_calls.len(), 2);
    assert_eq!(session.history().last(), Some(&Message::assistant("done")));
}

#[tokio::test]
async fn test_tool_failures_become_error_messages_and_turn_continues() {
    let backend = ScriptedBackend::new(vec![
        tool_calls(&[
            ("call_a", "echo", r#"{"text":"fail"}"#),
            ("call_b", "no_such_tool", "{}"),
            ("call_c", "get_weather", r#"{"city":"Paris"}"#),
        ]),
        final_answer("Sorry, something went wrong."),
    ]);
    let mut session = session_with(backend.clone(), SessionConfig::default());

    run_turn(&mut session, "try things").await.unwrap();

    let sent = backend.history_sent(1);
    let tool_messages: Vec<_> = sent.iter().filter(|m| m.role == Role::Tool).collect();
    assert_eq!(tool_messages.len(), 3);
    assert_eq!(tool_messages[0].content, "Error: echo refused");
    assert!(tool_messages[1].content.starts_with("Error: "));
    assert!(tool_messages[1].content.contains("no_such_tool"));
    assert!(tool_messages[2].content.contains("location"));
    assert_eq!(session.state(), SessionState::AwaitingInput);
}

#[tokio::test]
async fn test_tool_loop_bound_fails_turn_but_session_survives() {
    let looping = || tool_calls(&[("call_x", "echo", r#"{"text":"again"}"#)]);
    let backend = ScriptedBackend::new(vec![looping(), looping(), looping(), final_answer("recovered")]);
    let config = SessionConfig {
        max_tool_rounds: 2,
        ..SessionConfig::default()
    };
    let mut session = session_with(backend.clone(), config);

    let err = run_turn(&mut session, "loop forever").await.unwrap_err();
    assert!(matches!(err, TurnError::ToolLoopExceeded { limit: 2 }));
    assert_eq!(backend.calls(), 3);
    assert_eq!(session.state(), SessionState::AwaitingInput);
    assert_eq!(session.history().last(), Some(&Message::user("loop forever")));

    let answer = run_turn(&mut session, "try again").await.unwrap();
    assert_eq!(answer.content, "recovered");
}

#[tokio::test]
async fn test_malformed_response_keeps_user_message_only() {
    let backend = ScriptedBackend::new(vec![
        tool_calls(&[("call_1", "echo", r#"{"text":"hi"}"#)]),
        Err(BackendError::Response("response contained no choices".to_string())),
    ]);
    let mut session = session_with(backend, SessionConfig::default());

    let err = run_turn(&mut session, "Hello").await.unwrap_err();
    assert!(matches!(err, TurnError::Backend(BackendError::Response(_))));
    assert_eq!(
        session.history(),
        &[Message::system(chatly_types::DEFAULT_SYSTEM_PROMPT), Message::user("Hello")]
    );
}

#[tokio::test]
async fn test_cancellation_ends_turn() {
    let mut session = session_with(Arc::new(HangingBackend), SessionConfig::default());
    session.submit_user_input("Hello").unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = session.advance(&cancel).await.unwrap_err();
    assert!(matches!(err, TurnError::Cancelled));
    assert_eq!(session.state(), SessionState::AwaitingInput);
    assert_eq!(session.history().len(), 2);
}

/// Answers with canned HTTP responses, in order
struct CannedHttp {
    responses: Mutex<VecDeque<HttpResponse>>,
}

#[async_trait]
impl HttpTransport for CannedHttp {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Network("no more responses".to_string()))
    }
}

#[tokio::test]
async fn test_weather_question_end_to_end_through_audit() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("http-traffic.log");

    let tool_call_body = json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_paris",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    });
    let final_body = json!({
        "choices": [{
            "message": {"role": "assistant", "content": "It looks nice in Paris today."},
            "finish_reason": "stop"
        }]
    });
    let http = Arc::new(CannedHttp {
        responses: Mutex::new(VecDeque::from([
            HttpResponse::new(200, tool_call_body.to_string()),
            HttpResponse::new(200, final_body.to_string()),
        ])),
    });

    let recorder = AuditRecorder::new(&log_path, ["api-key", "authorization"]);
    let transport = Arc::new(AuditingTransport::new(http, recorder));
    let config = BackendConfig::new(BackendType::AzureOpenAi, "https://res.test", "secret-key", "gpt-4o");
    let backend = Arc::new(ChatBackendClient::new(transport, config));

    let mut session = session_with(backend, SessionConfig::default());
    let answer = run_turn(&mut session, "What's the weather in Paris?").await.unwrap();
    assert_eq!(answer.content, "It looks nice in Paris today.");

    let tool_message = session
        .history()
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_paris"));
    assert!(WEATHER_CONDITIONS
        .iter()
        .any(|c| tool_message.content == format!("The weather in Paris is {}.", c)));

    let raw = std::fs::read_to_string(&log_path).unwrap();
    assert!(!raw.contains("secret-key"));
    let records: Vec<HttpExchangeRecord> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == Some(200)));
    // The second request carries the tool result back
    assert!(records[1].request_body.contains("call_paris"));
    assert!(records[1].request_body.contains("The weather in Paris is"));
}
