use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use chatly_llm_api::{BackendError, ChatBackend, Completion};
use chatly_toolcore::ToolRegistry;
use chatly_types::{
    Message, ToolDefinition, ToolInvocationRequest, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_SYSTEM_PROMPT,
    EXIT_KEYWORD,
};

use crate::state::{InputOutcome, SessionState};

/// Session settings fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub system_prompt: String,
    /// Tool rounds allowed per turn before the turn is abandoned
    pub max_tool_rounds: usize,
    pub exit_keyword: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            exit_keyword: EXIT_KEYWORD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

/// Why a turn failed. The session is back at `AwaitingInput` afterwards.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("gave up after {limit} tool rounds without a final answer")]
    ToolLoopExceeded { limit: usize },
    #[error("turn cancelled")]
    Cancelled,
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// One conversation with the backend.
///
/// History starts with the system prompt and only grows, except that a
/// failed turn drops everything it appended after the user message.
pub struct ConversationSession {
    id: Uuid,
    backend: Arc<dyn ChatBackend>,
    registry: Arc<ToolRegistry>,
    config: SessionConfig,
    history: Vec<Message>,
    state: SessionState,
    turn_count: usize,
    /// History length right after the current turn's user message
    turn_checkpoint: usize,
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("messages", &self.history.len())
            .field("turn_count", &self.turn_count)
            .field("tools", &self.registry.get_tool_names())
            .finish()
    }
}

impl ConversationSession {
    pub fn new(backend: Arc<dyn ChatBackend>, registry: Arc<ToolRegistry>, config: SessionConfig) -> Self {
        let history = vec![Message::system(config.system_prompt.as_str())];
        let id = Uuid::new_v4();
        log::debug!("Session {} started with {} tools", id, registry.len());

        Self {
            id,
            backend,
            registry,
            config,
            turn_checkpoint: history.len(),
            history,
            state: SessionState::AwaitingInput,
            turn_count: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Completed turns so far
    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Offer one line of user input.
    pub fn submit_user_input(&mut self, text: &str) -> Result<InputOutcome, SessionError> {
        match self.state {
            SessionState::AwaitingInput => {}
            SessionState::Displaying => self.complete_display(),
            state @ (SessionState::Processing | SessionState::Ended) => {
                return Err(SessionError::InvalidState {
                    operation: "accept input",
                    state,
                });
            }
        }

        let text = text.trim();
        if text.eq_ignore_ascii_case(&self.config.exit_keyword) {
            log::info!("Session {} ended after {} turns", self.id, self.turn_count);
            self.state = SessionState::Ended;
            return Ok(InputOutcome::Ended);
        }
        if text.is_empty() {
            return Ok(InputOutcome::Ignored);
        }

        self.history.push(Message::user(text));
        self.turn_checkpoint = self.history.len();
        self.state = SessionState::Processing;
        Ok(InputOutcome::Accepted)
    }

    /// Drive the accepted user message to a final answer.
    ///
    /// Backend calls race `cancel`. On any failure the history is rolled
    /// back to just after the user message.
    pub async fn advance(&mut self, cancel: &CancellationToken) -> Result<Message, TurnError> {
        if self.state != SessionState::Processing {
            return Err(SessionError::InvalidState {
                operation: "advance",
                state: self.state,
            }
            .into());
        }

        match self.run_turn(cancel).await {
            Ok(answer) => {
                self.turn_count += 1;
                self.state = SessionState::Displaying;
                Ok(answer)
            }
            Err(e) => {
                let dropped = self.history.len() - self.turn_checkpoint;
                self.history.truncate(self.turn_checkpoint);
                self.state = SessionState::AwaitingInput;
                log::warn!("Turn failed ({} messages rolled back): {}", dropped, e);
                Err(e)
            }
        }
    }

    /// The final answer has been shown
    pub fn complete_display(&mut self) {
        if self.state == SessionState::Displaying {
            self.state = SessionState::AwaitingInput;
        }
    }

    async fn run_turn(&mut self, cancel: &CancellationToken) -> Result<Message, TurnError> {
        let tools = self.registry.tool_definitions();
        let mut rounds = 0;

        loop {
            let completion = self.request_completion(&tools, cancel).await?;

            match completion {
                Completion::Final(answer) => {
                    self.history.push(answer.clone());
                    return Ok(answer);
                }
                Completion::ToolCalls { content, calls } => {
                    if rounds >= self.config.max_tool_rounds {
                        return Err(TurnError::ToolLoopExceeded {
                            limit: self.config.max_tool_rounds,
                        });
                    }
                    rounds += 1;

                    self.history.push(Message::assistant_tool_calls(content, calls.clone()));
                    for call in &calls {
                        let output = self.run_tool(call).await;
                        self.history.push(Message::tool(call.id.as_str(), output));
                    }
                }
            }
        }
    }

    async fn request_completion(
        &self,
        tools: &[ToolDefinition],
        cancel: &CancellationToken,
    ) -> Result<Completion, TurnError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TurnError::Cancelled),
            result = self.backend.complete(&self.history, tools) => Ok(result?),
        }
    }

    /// Run one requested tool; failures become the tool message text
    async fn run_tool(&self, call: &ToolInvocationRequest) -> String {
        log::info!("Calling tool {} ({})", call.name, call.id);
        match self.registry.dispatch(&call.name, &call.arguments).await {
            Ok(result) => result.to_message_content(),
            Err(e) => {
                log::warn!("Tool call {} rejected: {}", call.id, e);
                format!("Error: {}", e)
            }
        }
    }
}
