use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod cli;
mod core;
mod daemon;
mod notifications;

use crate::core::settings::Settings;

#[derive(Parser)]
#[command(name = "kimsufi-watch")]
#[command(author, version, about = "Alerts once a Kimsufi server SKU becomes available")]
struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the availability API until stopped
    Run,

    /// Poll once and print the result without notifying
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(settings.debug, cli.log_json);

    match &settings.source {
        Some(path) => tracing::info!(?path, "Loaded config"),
        None => tracing::info!("Config file not found, using defaults"),
    }

    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let settings = load_settings(&cli)?;

            if let Err(e) = daemon::run(settings).await {
                let correlation_id =
                    core::diagnostics::report_fault("daemon terminated", &*e);
                return Err(e.context(format!("daemon terminated ({correlation_id})")));
            }
            Ok(())
        }
        Commands::Check { json } => {
            let settings = load_settings(&cli)?;
            cli::check::run(&settings, json).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}
