// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! tidewire CLI - session-aware requests against a JSON API.
//!
//! # Examples
//!
//! ```bash
//! # Point tidewire at a server
//! tidewire config init --domain api.example.com --subdomain /v1
//!
//! # Log in through the API, keeping the token in the system keychain
//! tidewire login --path users/sessions -p email=ana@example.com -p password=secret
//!
//! # Authenticated request
//! tidewire get books -p page=2
//!
//! # Wait for a long-running job (server answers 202 until done)
//! tidewire poll reports/7 --max-retries 30
//!
//! # Status, headers, and body
//! tidewire raw books/1 --format json --pretty
//! ```

mod commands;
mod context;
mod output;
mod params;
mod repository;
mod user;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tidewire_core::{ConfigError, RepositoryError, SessionError};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, request, session};

// ============================================================================
// CLI Definition
// ============================================================================

/// tidewire CLI - session-aware requests against a JSON API.
#[derive(Parser)]
#[command(name = "tidewire")]
#[command(about = "Session-aware HTTP client for JSON APIs")]
#[command(long_about = r#"
tidewire sends authenticated requests to a JSON API, keeps the session
token in the system keychain, and waits out long-running jobs that answer
202 Accepted until they are done.

Examples:
  tidewire config init --domain api.example.com
  tidewire login --path users/sessions -p email=a@b.c -p password=x
  tidewire get books -p page=2
  tidewire poll reports/7
  tidewire status --me users/me
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the user config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server host; overrides the configuration file.
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// Use http instead of https (with --domain).
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Server port (with --domain).
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Path prefix such as /api/v1 (with --domain).
    #[arg(long, global = true)]
    pub subdomain: Option<String>,

    /// Keep the session in memory instead of the system keychain.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Use this session token for this run only.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Log every request and response.
    #[arg(long, global = true)]
    pub traffic: bool,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start a session.
    Login(session::LoginArgs),

    /// End the session.
    Logout,

    /// Show the session state.
    #[command(visible_alias = "s")]
    Status(session::StatusArgs),

    /// Authenticated request, body printed as JSON.
    #[command(visible_alias = "g")]
    Get(request::RequestArgs),

    /// Authenticated request retried while the server answers 202.
    #[command(visible_alias = "p")]
    Poll(request::PollArgs),

    /// Authenticated request, printing status, headers, and body.
    Raw(request::RequestArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// General error.
    Error = 1,
    /// No session, or the server rejected it.
    Unauthenticated = 2,
    /// Server unreachable.
    NoNetwork = 3,
    /// Missing or invalid configuration.
    Config = 4,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    pub fn for_error(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(e) = cause.downcast_ref::<RepositoryError>() {
                return match e {
                    RepositoryError::UnauthenticatedSession => ExitCode::Unauthenticated,
                    RepositoryError::NoNetworkConnection => ExitCode::NoNetwork,
                    _ => ExitCode::Error,
                };
            }
            if let Some(SessionError::NotAuthenticated) = cause.downcast_ref::<SessionError>() {
                return ExitCode::Unauthenticated;
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return ExitCode::Config;
            }
        }
        ExitCode::Error
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("tidewire=debug,info")
    } else {
        EnvFilter::new("tidewire=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose || cli.traffic, cli.quiet);

    let result = match &cli.command {
        Commands::Login(args) => session::login(args, &cli).await,
        Commands::Logout => session::logout(&cli).await,
        Commands::Status(args) => session::status(args, &cli).await,
        Commands::Get(args) => request::get(args, &cli).await,
        Commands::Poll(args) => request::poll(args, &cli).await,
        Commands::Raw(args) => request::raw(args, &cli).await,
        Commands::Config(args) => config::run(args, &cli),
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}
