//! Built-in tools the assistant may call.

pub mod weather;

pub use weather::{GetWeatherTool, WEATHER_CONDITIONS};

use chatly_toolcore::{ToolError, ToolRegistry};

/// Register every built-in tool
pub fn register_default_tools(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(GetWeatherTool::new())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tools_register_once() {
        let mut registry = ToolRegistry::new();
        register_default_tools(&mut registry).unwrap();
        assert_eq!(registry.get_tool_names(), vec!["get_weather"]);

        // Registering the set twice is a duplicate
        assert!(register_default_tools(&mut registry).is_err());
    }
}
