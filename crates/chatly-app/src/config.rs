use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use chatly_chat::SessionConfig;
use chatly_llm_api::{BackendConfig, BackendType, AZURE_API_KEY_HEADER, BEARER_AUTH_HEADER};
use chatly_logging::DEFAULT_AUDIT_LOG;

use crate::cli::Cli;

/// Settings file picked up from the working directory when `--settings` is not given
pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting '{name}' (use {flag}, {env} or {settings_key} in the settings file)")]
    Missing {
        name: &'static str,
        flag: &'static str,
        env: &'static str,
        settings_key: &'static str,
    },
    #[error("invalid value for '{name}': {message}")]
    Invalid { name: &'static str, message: String },
}

/// `appsettings.json` layout
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFile {
    #[serde(rename = "Azure", default)]
    pub azure: AzureSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AzureSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment_name: Option<String>,
}

impl SettingsFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Invalid {
            name: "settings",
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Invalid {
            name: "settings",
            message: format!("{} is not valid settings JSON: {}", path.display(), e),
        })
    }

    /// An explicit path must exist; the default file is optional
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.is_file() {
                    log::info!("Loading settings from {}", default_path.display());
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub audit_log: PathBuf,
    /// Lower-cased header names left out of audit records
    pub redacted_headers: Vec<String>,
    pub timeout: Duration,
    pub session: SessionConfig,
    pub verbose: bool,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl AppConfig {
    /// Precedence: CLI flag > environment > settings file > defaults.
    /// Environment values arrive through `cli` already (clap `env`).
    pub fn resolve(cli: &Cli, settings: &SettingsFile) -> Result<Self, ConfigError> {
        let backend_type = match non_empty(cli.backend.as_deref()) {
            Some(name) => BackendType::from_str(&name).ok_or_else(|| ConfigError::Invalid {
                name: "backend",
                message: format!("unknown backend '{}' (expected azure or openai)", name),
            })?,
            None => BackendType::AzureOpenAi,
        };

        let endpoint = non_empty(cli.endpoint.as_deref())
            .or_else(|| non_empty(settings.azure.endpoint.as_deref()))
            .ok_or(ConfigError::Missing {
                name: "endpoint",
                flag: "--endpoint",
                env: "CHATLY_ENDPOINT",
                settings_key: "Azure:Endpoint",
            })?;
        let credential = non_empty(cli.api_key.as_deref())
            .or_else(|| non_empty(settings.azure.api_key.as_deref()))
            .ok_or(ConfigError::Missing {
                name: "api key",
                flag: "--api-key",
                env: "CHATLY_API_KEY",
                settings_key: "Azure:ApiKey",
            })?;
        let deployment = non_empty(cli.deployment.as_deref())
            .or_else(|| non_empty(settings.azure.deployment_name.as_deref()))
            .ok_or(ConfigError::Missing {
                name: "deployment",
                flag: "--deployment",
                env: "CHATLY_DEPLOYMENT",
                settings_key: "Azure:DeploymentName",
            })?;

        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "endpoint",
                message: format!("'{}' is not an http(s) URL", endpoint),
            });
        }

        let mut backend = BackendConfig::new(backend_type, endpoint, credential, deployment);
        if let Some(version) = non_empty(cli.api_version.as_deref()) {
            backend = backend.with_api_version(version);
        }

        let max_tool_rounds = cli.max_tool_rounds.unwrap_or(chatly_types::DEFAULT_MAX_TOOL_ROUNDS);
        if max_tool_rounds == 0 {
            return Err(ConfigError::Invalid {
                name: "max tool rounds",
                message: "must be at least 1".to_string(),
            });
        }

        let timeout_secs = cli.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "timeout",
                message: "must be at least 1 second".to_string(),
            });
        }

        let redacted_headers = redaction_set(&cli.redact_headers, backend_type);

        let mut session = SessionConfig {
            max_tool_rounds,
            ..SessionConfig::default()
        };
        if let Some(prompt) = non_empty(cli.system_prompt.as_deref()) {
            session.system_prompt = prompt;
        }

        Ok(Self {
            backend,
            audit_log: cli.audit_log.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_LOG)),
            redacted_headers,
            timeout: Duration::from_secs(timeout_secs),
            session,
            verbose: cli.verbose,
        })
    }
}

/// Configured names (or the defaults), plus the header carrying the credential
fn redaction_set(configured: &[String], backend: BackendType) -> Vec<String> {
    let mut names: Vec<String> = configured
        .iter()
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        names = vec![AZURE_API_KEY_HEADER.to_string(), BEARER_AUTH_HEADER.to_string()];
    }
    names.push(backend.credential_header().to_string());
    names.sort();
    names.dedup();
    names
}
