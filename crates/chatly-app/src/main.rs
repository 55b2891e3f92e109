use anyhow::{Context, Result};
use clap::Parser;

use chatly::{build_app, run_repl_mode, AppConfig, Cli, SettingsFile};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = SettingsFile::discover(cli.settings.as_deref()).context("Failed to load settings")?;
    let config = AppConfig::resolve(&cli, &settings).context("Invalid configuration")?;

    let mut app = build_app(&config)?;
    run_repl_mode(&mut app.session).await
}
