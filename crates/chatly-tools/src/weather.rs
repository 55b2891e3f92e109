use anyhow::Result;
use async_trait::async_trait;
use chatly_toolcore::{param, ParameterDefinition, Tool, ToolParameters};
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Conditions the weather tool picks from
pub const WEATHER_CONDITIONS: [&str; 5] = ["sunny", "cloudy", "rainy", "windy", "stormy"];

/// Demo weather lookup. Answers with a random condition for any location.
#[derive(Debug, Default, Clone, Copy)]
pub struct GetWeatherTool;

impl GetWeatherTool {
    pub fn new() -> Self {
        Self
    }

    fn pick_condition(&self) -> &'static str {
        WEATHER_CONDITIONS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(WEATHER_CONDITIONS[0])
    }
}

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a given location"
    }

    fn parameters(&self) -> HashMap<String, ParameterDefinition> {
        HashMap::from([
            param!("location", "string", "The city or place to get the weather for", required),
        ])
    }

    async fn execute(&self, params: ToolParameters) -> Result<String> {
        let location: String = params.get_required("location")?;
        let location = location.trim();
        if location.is_empty() {
            anyhow::bail!("location must not be empty");
        }

        log::info!("Getting weather for location: {}", location);

        Ok(format!("The weather in {} is {}.", location, self.pick_condition()))
    }
}
