//! Conversation session: user turns, tool rounds and history.

pub mod session;
pub mod state;

pub use session::{ConversationSession, SessionConfig, SessionError, TurnError};
pub use state::{InputOutcome, SessionState};
