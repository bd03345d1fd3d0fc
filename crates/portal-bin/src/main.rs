//! Tidewatch Portal - admin portal client for sign-in, signup, and session
//! resolution against the Tidewatch backends.

mod auth;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use portal_config::{init_logging, Config, Paths};

/// Tidewatch portal command-line interface.
#[derive(Parser)]
#[command(name = "tidewatch-portal")]
#[command(about = "Tidewatch admin portal client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Base directory for runtime files (config, flow state). Defaults to ~/.tidewatch
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in through the geoportal provider
    Login {
        /// Create a new tenant for your provider organization
        #[arg(long)]
        signup: bool,
    },
    /// Show the stored flow state and resolved session
    Status,
    /// Clear the stored flow state
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    match cli.command {
        Commands::Login { signup } => {
            auth::login::run(&config, &paths, signup).await?;
        }
        Commands::Status => {
            auth::status::run(&config, &paths).await?;
        }
        Commands::Logout => {
            auth::logout::run(&paths)?;
        }
    }

    Ok(())
}
