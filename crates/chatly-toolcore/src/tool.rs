use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use chatly_types::ToolDefinition;

/// Tool parameters
#[derive(Debug, Clone, Default)]
pub struct ToolParameters {
    pub data: HashMap<String, Value>,
}

impl ToolParameters {
    /// Parse raw argument text and check it against a tool's schema.
    ///
    /// Empty text means "no arguments". Optional parameters that are absent
    /// (or null) get their declared default, if any.
    pub fn parse(raw: &str, schema: &HashMap<String, ParameterDefinition>) -> Result<Self, String> {
        let raw = raw.trim();
        let value: Value = if raw.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON: {}", e))?
        };

        let mut data: HashMap<String, Value> = match value {
            Value::Object(map) => map.into_iter().collect(),
            other => return Err(format!("arguments must be a JSON object, got {}", json_type_name(&other))),
        };

        // Sorted so the first reported problem is deterministic
        let mut names: Vec<_> = schema.keys().collect();
        names.sort();

        for name in names {
            let def = &schema[name];
            match data.get(name) {
                Some(Value::Null) | None => {
                    if def.required {
                        return Err(format!("required parameter '{}' missing", name));
                    }
                    match &def.default {
                        Some(default) => {
                            data.insert(name.clone(), default.clone());
                        }
                        None => {
                            data.remove(name);
                        }
                    }
                }
                Some(value) if !matches_type(&def.param_type, value) => {
                    return Err(format!(
                        "parameter '{}' must be {}, got {}",
                        name,
                        def.param_type,
                        json_type_name(value)
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(Self { data })
    }

    pub fn get_required<T>(&self, key: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self.data.get(key)
            .ok_or_else(|| anyhow::anyhow!("Required parameter '{}' missing", key))?;

        serde_json::from_value(value.clone())
            .map_err(|e| anyhow::anyhow!("Failed to parse parameter '{}': {}", key, e))
    }

    pub fn get_optional<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.data.get(key) {
            Some(value) => {
                let parsed: T = serde_json::from_value(value.clone())
                    .map_err(|e| anyhow::anyhow!("Failed to parse parameter '{}': {}", key, e))?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }
}

fn matches_type(param_type: &str, value: &Value) -> bool {
    match param_type {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Tool execution result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(content: String) -> Self {
        Self {
            success: true,
            content,
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            content: String::new(),
            error: Some(error),
        }
    }

    /// Text handed back to the model as the tool message content
    pub fn to_message_content(&self) -> String {
        match &self.error {
            Some(error) => format!("Error: {}", error),
            None => self.content.clone(),
        }
    }
}

/// Tool parameter definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub param_type: String,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
}

/// Tool trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name of the tool (must be unique)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Parameter definitions
    fn parameters(&self) -> HashMap<String, ParameterDefinition>;

    /// Run the tool on already-validated parameters
    async fn execute(&self, params: ToolParameters) -> Result<String>;

    /// Declaration sent to the backend
    fn to_definition(&self) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        let mut params: Vec<_> = self.parameters().into_iter().collect();
        params.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, param_def) in params {
            let mut param_json = serde_json::json!({
                "type": param_def.param_type,
                "description": param_def.description,
            });
            if let Some(default) = param_def.default {
                param_json["default"] = default;
            }
            properties.insert(name.clone(), param_json);

            if param_def.required {
                required.push(name);
            }
        }

        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required
            }),
        }
    }
}

/// Helper macro for creating parameter definitions
#[macro_export]
macro_rules! param {
    ($name:expr, $type:expr, $desc:expr, required) => {
        (
            $name.to_string(),
            $crate::ParameterDefinition {
                param_type: $type.to_string(),
                description: $desc.to_string(),
                required: true,
                default: None,
            }
        )
    };
    ($name:expr, $type:expr, $desc:expr, optional, $default:expr) => {
        (
            $name.to_string(),
            $crate::ParameterDefinition {
                param_type: $type.to_string(),
                description: $desc.to_string(),
                required: false,
                default: Some(serde_json::Value::from($default)),
            }
        )
    };
    ($name:expr, $type:expr, $desc:expr, optional) => {
        (
            $name.to_string(),
            $crate::ParameterDefinition {
                param_type: $type.to_string(),
                description: $desc.to_string(),
                required: false,
                default: None,
            }
        )
    };
}
