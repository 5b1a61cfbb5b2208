//! Config command - manage the networking configuration file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use serde_json::json;
use tidewire_core::{NetworkingConfiguration, NetworkingConfigurationBuilder};
use tracing::info;

use crate::context::load_config;
use crate::output::to_json;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,

    /// Show the configuration file path.
    Path,

    /// Write a configuration file.
    Init(InitArgs),
}

/// Arguments for `config init`. Host, port, and path prefix come from
/// the global `--domain`, `--insecure`, `--port`, and `--subdomain` flags.
#[derive(Args)]
pub struct InitArgs {
    /// PEM certificate to pin.
    #[arg(long)]
    pub pin: Option<PathBuf>,

    /// Delay between polls in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Give up polling after this many retries.
    #[arg(long)]
    pub max_poll_retries: Option<u32>,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => show_path(cli),
        ConfigAction::Init(init) => init_config(init, cli),
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(NetworkingConfiguration::default_path)
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    let view = json!({
        "baseUrl": config.base_url().as_str(),
        "secure": config.use_secure_connection(),
        "pinnedCertificate": config.pinned_certificate().map(|p| p.display().to_string()),
        "requestTimeoutMs": u64::try_from(config.request_timeout().as_millis()).unwrap_or(u64::MAX),
        "pollIntervalMs": u64::try_from(config.poll_interval().as_millis()).unwrap_or(u64::MAX),
        "maxPollRetries": config.max_poll_retries(),
    });

    match cli.format {
        OutputFormat::Json => println!("{}", to_json(&view, cli.pretty)?),
        OutputFormat::Text => {
            println!("tidewire Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Base URL:        {}", config.base_url());
            println!("Pinning:         {}", config.use_pinning_certificate());
            println!("Request timeout: {}ms", config.request_timeout().as_millis());
            println!("Poll interval:   {}ms", config.poll_interval().as_millis());
            match config.max_poll_retries() {
                Some(max) => println!("Poll retries:    {max}"),
                None => println!("Poll retries:    unbounded"),
            }
        }
    }
    Ok(())
}

fn show_path(cli: &Cli) -> Result<()> {
    let path = config_path(cli);
    match cli.format {
        OutputFormat::Json => {
            let view = json!({ "config_file": path.display().to_string() });
            println!("{}", to_json(&view, cli.pretty)?);
        }
        OutputFormat::Text => println!("{}", path.display()),
    }
    Ok(())
}

fn init_config(args: &InitArgs, cli: &Cli) -> Result<()> {
    let path = config_path(cli);
    if path.exists() && !args.force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }

    let builder = init_builder(args, cli)?;
    // Validate before writing.
    let config = builder.clone().build().context("Invalid configuration")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(&builder)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), "Configuration written");
    if !cli.quiet {
        println!("Wrote {} ({})", path.display(), config.base_url());
    }
    Ok(())
}

fn init_builder(args: &InitArgs, cli: &Cli) -> Result<NetworkingConfigurationBuilder> {
    let Some(domain) = &cli.domain else {
        bail!("--domain is required");
    };

    let mut builder = NetworkingConfiguration::builder(domain.clone()).secure(!cli.insecure);
    if let Some(port) = cli.port {
        builder = builder.port(port);
    }
    if let Some(subdomain) = &cli.subdomain {
        builder = builder.subdomain(subdomain.clone());
    }
    if let Some(pin) = &args.pin {
        builder = builder.pinned_certificate(pin.clone());
    }
    if let Some(ms) = args.poll_interval_ms {
        builder = builder.poll_interval(Duration::from_millis(ms));
    }
    if let Some(max) = args.max_poll_retries {
        builder = builder.max_poll_retries(max);
    }
    Ok(builder)
}
