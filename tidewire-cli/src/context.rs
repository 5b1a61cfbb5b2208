//! Composition root.
//!
//! Builds the configuration, the session store, and the repository once
//! per invocation and hands them to the commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use tidewire_core::{CustomErrorMap, NetworkingConfiguration};
use tidewire_fetch::host::keychain::{accounts, services};
use tidewire_fetch::{KeychainApi, MemoryKeychain, PollPolicy, Repository, ReqwestExecutor, SystemKeychain};
use tidewire_store::{BootstrapReport, SessionStore};
use tracing::{debug, warn};

use crate::Cli;
use crate::repository::{CurrentUserEndpoint, JsonRepository};
use crate::user::CliUser;

/// Everything a command needs to talk to the server.
pub struct AppContext {
    /// Shared configuration.
    pub config: Arc<NetworkingConfiguration>,
    /// Session state.
    pub session: Arc<SessionStore<CliUser>>,
    /// Repository for requests.
    pub repository: JsonRepository,
}

impl AppContext {
    /// Wires configuration, keychain, session store, and repository.
    pub fn build(cli: &Cli, errors: CustomErrorMap, poll_policy: Option<PollPolicy>) -> Result<Self> {
        let config = Arc::new(load_config(cli)?);
        let session = Arc::new(SessionStore::new(keychain(cli)));

        let executor = ReqwestExecutor::new(&config)
            .context("Failed to build HTTP client")?
            .with_traffic_log(cli.traffic);

        let mut builder = Repository::builder(Arc::clone(&config), session.clone())
            .executor(Arc::new(executor))
            .on_decode_error(|error| warn!(error = %error, "Unexpected response shape"));
        if let Some(policy) = poll_policy {
            builder = builder.poll_policy(policy);
        }
        let repository = JsonRepository::new(builder.build()?, errors);

        debug!(base_url = %config.base_url(), ephemeral = cli.ephemeral, "Context ready");
        Ok(Self {
            config,
            session,
            repository,
        })
    }

    /// Restores the persisted session.
    ///
    /// With `me_path`, the user of a restored session is fetched from that
    /// endpoint in the background; await the report to wait for it.
    pub async fn bootstrap(&self, me_path: Option<&str>) -> BootstrapReport {
        // The store only holds the fetcher weakly; the fetch task keeps its
        // own strong reference once started.
        let fetcher = me_path.map(|path| {
            Arc::new(CurrentUserEndpoint::new(
                self.repository.clone(),
                self.session.clone(),
                path,
            ))
        });
        if let Some(fetcher) = &fetcher {
            self.session.set_current_user_fetcher(fetcher);
        }

        self.session.bootstrap().await
    }
}

fn keychain(cli: &Cli) -> Arc<dyn KeychainApi> {
    match (&cli.token, cli.ephemeral) {
        (Some(token), _) => Arc::new(MemoryKeychain::with_entry(
            services::SESSION,
            accounts::CURRENT_TOKEN,
            token,
        )),
        (None, true) => Arc::new(MemoryKeychain::new()),
        (None, false) => Arc::new(SystemKeychain::new()),
    }
}

/// Loads the configuration from flags or from the configuration file.
pub fn load_config(cli: &Cli) -> Result<NetworkingConfiguration> {
    if let Some(domain) = &cli.domain {
        let mut builder = NetworkingConfiguration::builder(domain.clone()).secure(!cli.insecure);
        if let Some(port) = cli.port {
            builder = builder.port(port);
        }
        if let Some(subdomain) = &cli.subdomain {
            builder = builder.subdomain(subdomain.clone());
        }
        return builder.build().context("Invalid networking configuration");
    }

    let path = cli
        .config
        .clone()
        .unwrap_or_else(NetworkingConfiguration::default_path);
    NetworkingConfiguration::load_from(&path).with_context(|| {
        format!(
            "Could not load {}; run `tidewire config init --domain <host>` or pass --domain",
            path.display()
        )
    })
}
