//! # chatly-llm-api
//!
//! Backend access for chatly: the OpenAI-compatible chat completions client
//! and the HTTP transport chain it sends through.
//!
//! ## Layers
//!
//! - **`ChatBackend`**: takes the ordered history plus tool declarations and
//!   returns either a final assistant message or tool invocation requests
//! - **`HttpTransport`**: "send a request, get a fully read response"
//! - **`AuditingTransport`**: decorator that records every exchange through an
//!   `AuditRecorder` before handing the response back
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chatly_llm_api::{AuditingTransport, BackendConfig, BackendType, ChatBackend, ChatBackendClient, ReqwestTransport};
//! use chatly_logging::AuditRecorder;
//! use chatly_types::Message;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let recorder = AuditRecorder::new("http-traffic.log", ["api-key"]);
//!     let transport = AuditingTransport::new(Arc::new(ReqwestTransport::new()?), recorder);
//!     let config = BackendConfig::new(
//!         BackendType::AzureOpenAi,
//!         "https://my-resource.openai.azure.com",
//!         "secret",
//!         "gpt-4o",
//!     );
//!     let client = ChatBackendClient::new(Arc::new(transport), config);
//!
//!     let completion = client.complete(&[Message::user("Hello!")], &[]).await?;
//!     println!("{:?}", completion);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod transport;

// Re-export commonly used types
pub use client::{BackendError, ChatBackend, ChatBackendClient, Completion};
pub use config::{BackendConfig, BackendType, AZURE_API_KEY_HEADER, BEARER_AUTH_HEADER, DEFAULT_API_VERSION};
pub use transport::{
    AuditingTransport, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError,
};
