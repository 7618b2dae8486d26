//! SecOps health check entry point
//!
//! # Usage
//!
//! ```bash
//! # Run one check and exit
//! secops-health run validate-alert-generation
//!
//! # Serve checks over HTTP for a scheduler
//! secops-health serve --port 8080
//! ```
//!
//! # Exit Codes
//!
//! - 0: Check passed
//! - 1: Expected events, detections or alerts are missing
//! - 2: Backend returned an error status
//! - 3: Missing or malformed configuration
//! - 4: Network error
//! - 5: Unexpected response body
//! - 6: Unknown check

use clap::{Parser, Subcommand};
use colored::Colorize;
use secops_health::config::HealthCheckConfig;
use secops_health::contracts::CheckOutcome;
use secops_health::engine::HealthCheckEngine;
use secops_health::handler::{create_router, AppState, SUCCESS_BODY};
use secops_health::telemetry::{init_tracing, LogFormat};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "secops-health")]
#[command(about = "Health checks for the GitHub Enterprise to Google SecOps pipeline")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "json", env = "LOG_FORMAT", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Run a single check
    Run {
        /// Check name
        check: String,
    },

    /// List available checks
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let engine = HealthCheckEngine::new();

    match cli.command {
        Commands::Serve { port, host } => {
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let config = HealthCheckConfig::from_env()?;
            let state = Arc::new(AppState::new(engine, config));
            let router = create_router(state);

            tracing::info!("Starting SecOps health check server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }

        Commands::Run { check } => {
            let outcome = match HealthCheckConfig::from_env() {
                Ok(config) => engine.run(&check, &config).await,
                Err(error) => CheckOutcome::setup_failed(check.as_str(), error),
            };

            match outcome {
                CheckOutcome::Passed(_) => println!("{}", SUCCESS_BODY.green().bold()),
                CheckOutcome::Failed {
                    check,
                    stage,
                    error,
                    query,
                } => {
                    let stage = stage.map(|s| format!(" ({})", s)).unwrap_or_default();
                    eprintln!("{} {}{}: {}", "FAILED".red().bold(), check, stage, error);
                    if let Some(query) = query {
                        eprintln!("{} {}", "Query:".dimmed(), serde_json::to_string_pretty(&query)?);
                    }
                    std::process::exit(error.exit_code().into());
                }
            }
        }

        Commands::List => {
            for name in engine.names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
