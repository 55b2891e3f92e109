use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use chatly_logging::safe_truncate;
use chatly_models::{ChatRequest, ChatResponse, Tool};
use chatly_types::{Message, ToolDefinition, ToolInvocationRequest};

use crate::config::BackendConfig;
use crate::transport::{HttpRequest, HttpTransport};

/// Longest excerpt of an error body carried in a `BackendError`
const ERROR_BODY_EXCERPT: usize = 500;

/// Outcome of one completion call
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Final assistant answer for this turn
    Final(Message),
    /// The model wants tools run before it answers; `content` is any text
    /// that came along with the calls
    ToolCalls {
        content: String,
        calls: Vec<ToolInvocationRequest>,
    },
}

/// Errors from the completion backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected backend response: {0}")]
    Response(String),
    #[error("failed to build backend request: {0}")]
    Request(String),
}

/// Completion service: ordered history and tool declarations in, final
/// answer or tool invocation requests out.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Completion, BackendError>;
}

/// OpenAI-compatible chat completions client (Azure OpenAI or plain OpenAI)
pub struct ChatBackendClient {
    transport: Arc<dyn HttpTransport>,
    config: BackendConfig,
}

impl ChatBackendClient {
    pub fn new(transport: Arc<dyn HttpTransport>, config: BackendConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn build_chat_request(&self, history: &[Message], tools: &[ToolDefinition]) -> ChatRequest {
        let tool_definitions: Vec<Tool> = tools.iter().map(Tool::from).collect();
        let tool_choice = if tool_definitions.is_empty() {
            None
        } else {
            Some("auto".to_string())
        };

        ChatRequest {
            model: self.config.model_field(),
            messages: history.iter().map(chatly_models::Message::from).collect(),
            tools: tool_definitions,
            tool_choice,
        }
    }

    fn build_http_request(&self, body: Vec<u8>) -> HttpRequest {
        let (credential_name, credential_value) = self.config.credential_header();
        HttpRequest::post(self.config.completions_url(), body)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .header(credential_name, credential_value)
    }
}

/// Interpret a completions response body
pub fn parse_completion(body: &[u8]) -> Result<Completion, BackendError> {
    let chat_response: ChatResponse = serde_json::from_slice(body)
        .map_err(|e| BackendError::Response(format!("invalid JSON body: {}", e)))?;

    if let Some(usage) = &chat_response.usage {
        log::debug!(
            "Token usage - prompt: {}, completion: {}, total: {}",
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        );
    }

    let choice = chat_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Response("response contained no choices".to_string()))?;

    let message = choice.message;
    let calls = message.tool_calls.unwrap_or_default();

    if !calls.is_empty() {
        if let Some(bad) = calls.iter().find(|c| c.id.is_empty() || c.function.name.is_empty()) {
            return Err(BackendError::Response(format!(
                "tool call is missing its id or name: {:?}",
                bad
            )));
        }
        return Ok(Completion::ToolCalls {
            content: message.content,
            calls: calls.into_iter().map(ToolInvocationRequest::from).collect(),
        });
    }

    if message.content.trim().is_empty() {
        return Err(BackendError::Response(format!(
            "choice has neither content nor tool calls (finish_reason: {})",
            choice.finish_reason.as_deref().unwrap_or("none")
        )));
    }

    Ok(Completion::Final(Message::assistant(message.content)))
}

#[async_trait]
impl ChatBackend for ChatBackendClient {
    async fn complete(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Completion, BackendError> {
        let request = self.build_chat_request(history, tools);
        let body = serde_json::to_vec(&request).map_err(|e| BackendError::Request(e.to_string()))?;

        log::debug!(
            "Sending {} messages and {} tools to {}",
            request.messages.len(),
            request.tools.len(),
            self.config.backend.as_str()
        );

        let response = self
            .transport
            .send(self.build_http_request(body))
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        if !response.is_success() {
            return Err(BackendError::Unavailable(format!(
                "HTTP {}: {}",
                response.status,
                safe_truncate(&response.text(), ERROR_BODY_EXCERPT)
            )));
        }

        parse_completion(&response.body)
    }
}
