//! Session commands - login, logout, status.

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;
use tidewire_core::{CustomErrorMap, NetworkingMethod, SessionError};
use tracing::info;

use crate::context::AppContext;
use crate::output::{mask_token, to_json};
use crate::params::{parse_error_map, parse_params, split_path};
use crate::user::CliUser;
use crate::{Cli, OutputFormat};

// ============================================================================
// Login
// ============================================================================

/// Arguments for the login command.
#[derive(Args)]
pub struct LoginArgs {
    /// Store this token as the session without contacting the server.
    #[arg(long, conflicts_with = "path")]
    pub with_token: Option<String>,

    /// Authentication endpoint, e.g. `users/sessions`.
    #[arg(long, required_unless_present = "with_token")]
    pub path: Option<String>,

    /// HTTP method for the authentication request.
    #[arg(long, short = 'X', default_value = "POST")]
    pub method: NetworkingMethod,

    /// Request parameter as key=value (repeatable).
    #[arg(long = "param", short = 'p')]
    pub params: Vec<String>,

    /// Dotted path of the user object in the response (empty for the root).
    #[arg(long, default_value = "")]
    pub user_field: String,

    /// Dotted path of the token in the response.
    #[arg(long, default_value = "access_token")]
    pub token_field: String,

    /// Custom error as match=Name (repeatable).
    #[arg(long = "error", short = 'e')]
    pub errors: Vec<String>,
}

/// Runs the login command.
pub async fn login(args: &LoginArgs, cli: &Cli) -> Result<()> {
    let ctx = AppContext::build(cli, parse_error_map(&args.errors)?, None)?;
    ctx.bootstrap(None).await;

    let user = match (&args.with_token, &args.path) {
        (Some(token), _) => CliUser::from_token(token.clone()),
        (None, Some(path)) => {
            let params = parse_params(&args.params)?;
            let user_path = split_path(&args.user_field);
            let token_path = split_path(&args.token_field);
            ctx.repository
                .authenticate(args.method, path, params, &user_path, &token_path)
                .await
                .context("Authentication request failed")?
        }
        (None, None) => bail!("either --path or --with-token is required"),
    };

    let label = user.label();
    ctx.session.login(user).await.map_err(|e| match e {
        SessionError::AlreadyAuthenticated => {
            anyhow::anyhow!("Already logged in; run `tidewire logout` first")
        }
        SessionError::MissingToken => anyhow::anyhow!(
            "Response carried no token at '{}'; use --token-field",
            args.token_field
        ),
        other => other.into(),
    })?;

    info!(user = %label, "Logged in");
    if !cli.quiet {
        println!("Logged in as {label}");
    }
    Ok(())
}

// ============================================================================
// Logout
// ============================================================================

/// Runs the logout command.
pub async fn logout(cli: &Cli) -> Result<()> {
    let ctx = AppContext::build(cli, CustomErrorMap::new(), None)?;
    ctx.bootstrap(None).await;

    match ctx.session.logout().await {
        Ok(()) => {
            if !cli.quiet {
                println!("Logged out");
            }
            Ok(())
        }
        Err(SessionError::NotAuthenticated) => {
            if !cli.quiet {
                println!("Not logged in");
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Status
// ============================================================================

/// Arguments for the status command.
#[derive(Args, Default)]
pub struct StatusArgs {
    /// Endpoint returning the current user, fetched when logged in.
    #[arg(long)]
    pub me: Option<String>,
}

/// Session status as printed by the status command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusOutput {
    base_url: String,
    logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<CliUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<String>,
}

/// Runs the status command.
pub async fn status(args: &StatusArgs, cli: &Cli) -> Result<()> {
    let ctx = AppContext::build(cli, CustomErrorMap::new(), None)?;
    let mut failures = ctx.session.subscribe_bootstrap_errors();

    ctx.bootstrap(args.me.as_deref()).await.wait().await;

    let user_error = failures.try_recv().ok().map(|e| e.to_string());
    let output = StatusOutput {
        base_url: ctx.config.base_url().to_string(),
        logged_in: ctx.session.is_logged_in(),
        token: ctx.session.session_token().map(|t| mask_token(&t)),
        user: ctx.session.current_user().map(|mut user| {
            user.token = None;
            user
        }),
        user_error,
        since: ctx.session.last_changed().map(|at| {
            at.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        }),
    };

    match cli.format {
        OutputFormat::Json => println!("{}", to_json(&output, cli.pretty)?),
        OutputFormat::Text => {
            println!("Server:    {}", output.base_url);
            if output.logged_in {
                println!("Session:   active ({})", output.token.unwrap_or_default());
            } else {
                println!("Session:   none");
            }
            if let Some(user) = &output.user {
                println!("User:      {}", user.label());
            }
            if let Some(error) = &output.user_error {
                println!("User:      unavailable ({error})");
            }
            if let Some(since) = &output.since {
                println!("Loaded at: {since}");
            }
        }
    }
    Ok(())
}
