//! Chatly console application
//!
//! Command line parsing, configuration resolution and the wiring that turns
//! an [`AppConfig`] into a running conversation session.

pub use chatly_chat as chat;
pub use chatly_llm_api as llm_api;
pub use chatly_logging as logging;
pub use chatly_toolcore as toolcore;
pub use chatly_tools as tools;
pub use chatly_types as types;

pub mod app;
pub mod cli;
pub mod config;

pub use app::{build_app, run_repl_mode, App};
pub use cli::Cli;
pub use config::{AppConfig, ConfigError, SettingsFile, DEFAULT_SETTINGS_FILE};
