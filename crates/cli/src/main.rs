//! patentrag CLI: the main entry point.
//!
//! Commands:
//! - `ask`     : Answer a patent question through the full pipeline
//! - `memory`  : Show what the memory extractor finds in a history file
//! - `doctor`  : Check configuration and every remote service
//! - `config`  : Print the effective (or default) configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod bootstrap;
mod commands;

#[derive(Parser)]
#[command(
    name = "patentrag",
    about = "patentrag: retrieval-augmented answers to patent questions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question
    Ask {
        /// The question
        question: String,

        /// JSON array of prior `{role, content}` turns
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the full response with metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show facts and topics extracted from a conversation history
    Memory {
        /// JSON array of `{role, content}` turns
        #[arg(long)]
        history: PathBuf,
    },

    /// Diagnose configuration and service health
    Doctor,

    /// Print configuration
    Config {
        /// Print the built-in defaults instead of the effective config
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so `ask --json` output stays parseable.
    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Ask {
            question,
            history,
            json,
        } => commands::ask::run(&question, history.as_deref(), json).await?,
        Commands::Memory { history } => commands::memory::run(&history).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Config { default } => commands::config_cmd::show(default).await?,
    }

    Ok(())
}
