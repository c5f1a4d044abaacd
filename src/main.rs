use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

mod agent;
mod commands;
mod config;
mod connection;
mod error;
mod events;
mod session;
mod snowflake;
mod ui;

use config::Config;

#[derive(Parser)]
#[command(name = "medchat")]
#[command(version)]
#[command(about = "Chat with the Snowflake medical agent about hospital patient data", long_about = None)]
struct Cli {
    /// Tracing directive, e.g. "medchat=debug" (RUST_LOG wins)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question and print the answer
    Ask {
        /// The question, e.g. "How many patients live in Dallas?"
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Check the Snowflake connection
    Status,
    /// List the sample questions
    Samples,
}

fn filter_for(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("medchat=info"))
}

/// The terminal UI owns stdout, so its logs go to a file
fn init_file_logging(config: &Config, directive: &str) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .with_context(|| format!("Failed to open log file {}", config.log_path().display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter_for(directive))
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging(directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(directive))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    if !config.config_path().exists() {
        config.save()?;
    }
    let directive = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());

    match cli.command {
        None => {
            init_file_logging(&config, &directive)?;
            tracing::info!("medchat v{} starting", env!("CARGO_PKG_VERSION"));
            ui::run(config).await
        }
        Some(Commands::Ask { question }) => {
            init_stderr_logging(&directive);
            commands::ask(config, &question.join(" ")).await
        }
        Some(Commands::Status) => {
            init_stderr_logging(&directive);
            if !commands::status(config).await {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Samples) => {
            commands::samples();
            Ok(())
        }
    }
}
