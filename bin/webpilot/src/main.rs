mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "webpilot")]
#[command(about = "An LLM-driven browser automation agent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (default: ~/.webpilot/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single automation task
    Run {
        /// Natural-language task, e.g. "log in and check the inbox"
        query: String,

        /// Path to a recorded context events file (JSON)
        #[arg(short = 'x', long)]
        context: Option<PathBuf>,

        /// Run the browser with a visible window
        #[arg(long)]
        headed: bool,
    },

    /// Start the HTTP automation service
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Directory containing recorded context files
        #[arg(long, default_value = "context")]
        context_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(webpilot_core::Config::default_path);

    match cli.command {
        Commands::Run {
            query,
            context,
            headed,
        } => {
            commands::run::run(&config_path, &query, context.as_deref(), headed).await?;
        }
        Commands::Serve {
            host,
            port,
            context_dir,
        } => {
            commands::serve::run(&config_path, &host, port, context_dir).await?;
        }
    }

    Ok(())
}
