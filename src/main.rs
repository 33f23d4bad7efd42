use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use stock_manager::cli::runner::{run_command, App};
use stock_manager::cli::{Cli, Commands};
use stock_manager::config::AppConfig;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db.clone() {
        config.db_path = Some(db);
    }
    if cli.offline {
        config.offline = true;
    }

    init_logging(&config.log_level);

    if cli.no_color {
        colored::control::set_override(false);
    }

    debug!(
        "Provider: {}, offline: {}",
        config.provider.as_str(),
        config.offline
    );

    let app = App::from_config(&config)?;
    let command = cli.command.unwrap_or(Commands::Menu);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_command(&app, command, cli.json, &mut out)
}

/// Logs go to stderr so command and menu output stay clean
fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
