use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for chatly
///
/// Every connection setting can also come from a `CHATLY_*` environment
/// variable (a `.env` file is loaded first) or from an `appsettings.json`
/// file; flags win over both.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "chatly")]
#[command(about = "Console chat assistant with tool calling and HTTP traffic auditing")]
#[command(version)]
pub struct Cli {
    /// Base URL of the completion service (e.g. https://my-resource.openai.azure.com)
    #[arg(long, value_name = "URL", env = "CHATLY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Credential sent with every request
    #[arg(long, value_name = "KEY", env = "CHATLY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Deployment (Azure) or model (OpenAI) to talk to
    #[arg(long, value_name = "NAME", env = "CHATLY_DEPLOYMENT")]
    pub deployment: Option<String>,

    /// Backend type (azure, openai)
    #[arg(long, value_name = "BACKEND", env = "CHATLY_BACKEND")]
    pub backend: Option<String>,

    /// Azure OpenAI REST API version
    #[arg(long, value_name = "VERSION", env = "CHATLY_API_VERSION")]
    pub api_version: Option<String>,

    /// File that receives one JSON line per HTTP exchange
    #[arg(long, value_name = "PATH", env = "CHATLY_AUDIT_LOG")]
    pub audit_log: Option<PathBuf>,

    /// Header to leave out of the audit log (repeatable, or a comma list in the env var)
    #[arg(
        long = "redact-header",
        value_name = "NAME",
        env = "CHATLY_REDACT_HEADERS",
        value_delimiter = ','
    )]
    pub redact_headers: Vec<String>,

    /// Tool rounds allowed per turn before giving up
    #[arg(long, value_name = "N", env = "CHATLY_MAX_TOOL_ROUNDS")]
    pub max_tool_rounds: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", env = "CHATLY_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Override the system prompt
    #[arg(long, value_name = "TEXT", env = "CHATLY_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// JSON settings file (default: appsettings.json, if present)
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Enable verbose output (info-level logging)
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
