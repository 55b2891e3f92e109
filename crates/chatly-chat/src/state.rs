use std::fmt;

/// Where a session is in its turn cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next user line
    AwaitingInput,
    /// A user message was accepted; backend and tool rounds are pending
    Processing,
    /// The final answer is being shown
    Displaying,
    /// Terminal
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::AwaitingInput => "awaiting-input",
            SessionState::Processing => "processing",
            SessionState::Displaying => "displaying",
            SessionState::Ended => "ended",
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, SessionState::Ended)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a submitted line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Appended as a user message; the session is now processing
    Accepted,
    /// Empty or whitespace only
    Ignored,
    /// Exit keyword; the session is over
    Ended,
}
