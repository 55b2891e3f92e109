use anyhow::{Context, Result};
use std::sync::Arc;

use chatly_chat::ConversationSession;
use chatly_llm_api::{AuditingTransport, ChatBackendClient, ReqwestTransport};
use chatly_logging::AuditRecorder;
use chatly_toolcore::ToolRegistry;
use chatly_tools::register_default_tools;

use crate::config::AppConfig;

/// Everything the console loop needs
#[derive(Debug)]
pub struct App {
    pub session: ConversationSession,
    pub recorder: AuditRecorder,
}

/// Wire recorder, transports, backend client and tools into a session
pub fn build_app(config: &AppConfig) -> Result<App> {
    let recorder = AuditRecorder::new(&config.audit_log, &config.redacted_headers);

    let network = ReqwestTransport::with_timeout(config.timeout)
        .context("Failed to create HTTP client")?;
    let transport = AuditingTransport::new(Arc::new(network), recorder.clone());
    let backend = ChatBackendClient::new(Arc::new(transport), config.backend.clone());

    let mut registry = ToolRegistry::new();
    register_default_tools(&mut registry).context("Failed to register built-in tools")?;

    log::info!(
        "Using {} backend at {} (deployment {}), tools: {}",
        config.backend.backend.as_str(),
        config.backend.endpoint,
        config.backend.deployment,
        registry.get_tool_names().join(", ")
    );
    log::info!("Recording HTTP traffic to {}", recorder.path().display());

    let session = ConversationSession::new(
        Arc::new(backend),
        Arc::new(registry),
        config.session.clone(),
    );

    Ok(App { session, recorder })
}
