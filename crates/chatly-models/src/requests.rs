use serde::{Deserialize, Serialize};
use super::types::Message;

/// Tool definition for chat API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl Tool {
    pub fn function(name: String, description: String, parameters: serde_json::Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name,
                description,
                parameters,
            },
        }
    }
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Chat API request structure
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Azure routes by deployment in the URL, so the model is optional there
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

impl From<&chatly_types::ToolDefinition> for Tool {
    fn from(def: &chatly_types::ToolDefinition) -> Self {
        Tool::function(def.name.clone(), def.description.clone(), def.parameters.clone())
    }
}
