use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

use chatly_types::ToolDefinition;

use super::tool::{Tool, ToolParameters, ToolResult};

/// Registration and lookup failures. Handler failures are not errors here;
/// they come back as an error `ToolResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("tool '{0}' not found")]
    UnknownTool(String),
    #[error("invalid arguments for tool '{tool}': {message}")]
    ArgumentParse { tool: String, message: String },
}

/// Registry for managing and dispatching tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .field("tools", &self.get_tool_names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), ToolError> {
        self.register_arc(Arc::new(tool))
    }

    /// Register an already shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names, sorted
    pub fn get_tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate the raw arguments and run the named tool
    pub async fn dispatch(&self, name: &str, raw_arguments: &str) -> Result<ToolResult, ToolError> {
        let tool = self
            .get_tool(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let params = ToolParameters::parse(raw_arguments, &tool.parameters()).map_err(|message| {
            ToolError::ArgumentParse {
                tool: name.to_string(),
                message,
            }
        })?;

        let outcome = AssertUnwindSafe(tool.execute(params)).catch_unwind().await;

        Ok(match outcome {
            Ok(Ok(content)) => ToolResult::success(content),
            Ok(Err(e)) => {
                log::warn!("Tool '{}' failed: {:#}", name, e);
                ToolResult::error(format!("{:#}", e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::warn!("Tool '{}' panicked: {}", name, message);
                ToolResult::error(format!("tool '{}' crashed: {}", name, message))
            }
        })
    }

    /// Get all tool definitions, sorted by name so requests stay stable
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut tools: Vec<_> = self.tools.iter().collect();
        tools.sort_by_key(|(name, _)| name.as_str());
        tools.into_iter()
            .map(|(_, tool)| tool.to_definition())
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
