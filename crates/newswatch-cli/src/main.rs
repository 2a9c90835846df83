mod commands;
mod cycle;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "newswatch",
    version,
    about = "Newswatch - scheduled topic monitoring with LLM analysis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config directory (defaults to ~/.config/newswatch or ~/.newswatch)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and send an instant report
    Instant {
        /// Topic to research
        #[arg(short, long)]
        prompt: String,

        /// Email address to send the report to
        #[arg(short, long)]
        email: String,
    },

    /// Start scheduled monitoring (runs every N hours)
    Schedule {
        /// Topic to monitor
        #[arg(short, long)]
        prompt: String,

        /// Email address to send reports to
        #[arg(short, long)]
        email: String,

        /// Monitoring interval in hours
        #[arg(short, long)]
        interval: Option<u32>,
    },

    /// Generate an aggregate report from monitoring history
    Aggregate {
        /// Specific session ID
        #[arg(short, long)]
        session_id: Option<i64>,

        /// Aggregate all active sessions
        #[arg(long)]
        all: bool,

        /// Email address to send the report to
        #[arg(short, long)]
        email: String,
    },

    /// Show active monitoring sessions
    Status,

    /// Delete stored articles and reports past the retention window
    Cleanup {
        /// Retention window in days
        #[arg(long)]
        days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config_dir {
        Some(dir) => newswatch_config::ConfigLoader::with_dir(dir),
        None => newswatch_config::ConfigLoader::new(),
    };
    let config = loader.load()?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    loader.ensure_dirs(&config)?;

    match cli.command {
        Commands::Instant { prompt, email } => {
            commands::instant(&config, &loader, &prompt, &email).await?;
        }
        Commands::Schedule {
            prompt,
            email,
            interval,
        } => {
            commands::schedule(&config, &loader, &prompt, &email, interval).await?;
        }
        Commands::Aggregate {
            session_id,
            all,
            email,
        } => {
            commands::aggregate(&config, &loader, session_id, all, &email).await?;
        }
        Commands::Status => {
            commands::status(&config, &loader)?;
        }
        Commands::Cleanup { days } => {
            commands::cleanup(&config, &loader, days)?;
        }
    }

    Ok(())
}
