//! Request commands - get, poll, raw.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde_json::Value;
use tidewire_core::NetworkingMethod;
use tidewire_fetch::PollPolicy;

use crate::context::AppContext;
use crate::output::{RawOutput, to_json};
use crate::params::{parse_error_map, parse_params};
use crate::{Cli, OutputFormat};

/// Arguments shared by the request commands.
#[derive(Args)]
pub struct RequestArgs {
    /// Request path relative to the base URL, e.g. `books/1`.
    pub path: String,

    /// HTTP method.
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: NetworkingMethod,

    /// Request parameter as key=value (repeatable). Sent in the query
    /// string for GET-like methods and as a JSON body otherwise.
    #[arg(long = "param", short = 'p')]
    pub params: Vec<String>,

    /// Custom error as match=Name (repeatable). A numeric match is a status
    /// code, anything else a substring of the failure message.
    #[arg(long = "error", short = 'e')]
    pub errors: Vec<String>,
}

/// Arguments for the poll command.
#[derive(Args)]
pub struct PollArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Delay between polls in milliseconds.
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Give up after this many retries.
    #[arg(long)]
    pub max_retries: Option<u32>,
}

/// Runs the get command.
pub async fn get(args: &RequestArgs, cli: &Cli) -> Result<()> {
    let ctx = AppContext::build(cli, parse_error_map(&args.errors)?, None)?;
    ctx.bootstrap(None).await;

    let params = parse_params(&args.params)?;
    let value = ctx.repository.fetch(args.method, &args.path, params).await?;
    print_value(&value, cli)
}

/// Runs the poll command.
pub async fn poll(args: &PollArgs, cli: &Cli) -> Result<()> {
    let policy = poll_policy(args, cli)?;
    let ctx = AppContext::build(cli, parse_error_map(&args.request.errors)?, policy)?;
    ctx.bootstrap(None).await;

    let request = &args.request;
    let params = parse_params(&request.params)?;
    let value = ctx.repository.poll(request.method, &request.path, params).await?;
    print_value(&value, cli)
}

/// Runs the raw command.
pub async fn raw(args: &RequestArgs, cli: &Cli) -> Result<()> {
    let ctx = AppContext::build(cli, parse_error_map(&args.errors)?, None)?;
    ctx.bootstrap(None).await;

    let params = parse_params(&args.params)?;
    let response = ctx.repository.raw(args.method, &args.path, params).await?;
    println!("{}", RawOutput::new(&response).render(cli.format, cli.pretty)?);
    Ok(())
}

/// Overrides from flags on top of the configured policy, if any.
fn poll_policy(args: &PollArgs, cli: &Cli) -> Result<Option<PollPolicy>> {
    if args.interval_ms.is_none() && args.max_retries.is_none() {
        return Ok(None);
    }

    let config = crate::context::load_config(cli)?;
    let mut policy = PollPolicy::from_config(&config);
    if let Some(ms) = args.interval_ms {
        policy.interval = Duration::from_millis(ms);
    }
    if let Some(retries) = args.max_retries {
        policy = policy.with_max_retries(retries);
    }
    Ok(Some(policy))
}

fn print_value(value: &Value, cli: &Cli) -> Result<()> {
    let output = match cli.format {
        OutputFormat::Json => to_json(value, cli.pretty)?,
        OutputFormat::Text => serde_json::to_string_pretty(value)?,
    };
    println!("{output}");
    Ok(())
}
