// Models module - wire structures for OpenAI-compatible chat completions
pub mod types;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use types::{Message, ToolCall, FunctionCall};
pub use requests::{ChatRequest, Tool, FunctionDef};
pub use responses::{ChatResponse, Choice, Usage};
