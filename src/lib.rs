pub mod application;
pub mod domain;
pub mod infrastructure;

use application::bootstrap::{bootstrap_workspace, workspace_root, BootstrapResult};
use application::oauth::{EnsureTokenResult, OAuthConfig, OAuthManager};
use application::repl::{Console, Repl};
use application::todo_service::TodoService;
use infrastructure::calendar_gateway::{GatewaySettings, GoogleCalendarGateway};
use infrastructure::config::{read_client_secret, CredentialBackend};
use infrastructure::credential_store::{
    ConfiguredCredentialStore, FileCredentialStore, KeyringCredentialStore,
};
use infrastructure::error::InfraError;
use infrastructure::logging::init_logging;
use infrastructure::oauth_client::ReqwestOAuthClient;
use log::{error, info};
use std::sync::Arc;

/// Prepares the workspace, signs in if needed and runs the interactive session
/// on stdin/stdout until it ends.
pub async fn run() -> Result<(), InfraError> {
    let root = workspace_root()?;
    let bootstrap = bootstrap_workspace(&root)?;
    let _logger = init_logging(&bootstrap.config.log_level, &bootstrap.paths.logs_dir)?;

    let result = start_session(&bootstrap).await;
    match &result {
        Ok(()) => info!("event=session status=closed"),
        Err(error) => error!("event=session status=failed error={error}"),
    }
    result
}

async fn start_session(bootstrap: &BootstrapResult) -> Result<(), InfraError> {
    let config = &bootstrap.config;
    let zone = config.time_zone()?;

    let credential_store = match config.credential_backend {
        CredentialBackend::File => {
            ConfiguredCredentialStore::File(FileCredentialStore::new(&bootstrap.paths.token_path))
        }
        CredentialBackend::Keyring => ConfiguredCredentialStore::Keyring(KeyringCredentialStore::default()),
    };
    let client_secret = read_client_secret(&config.client_secret_path(&bootstrap.paths.root))?;
    let oauth_config = OAuthConfig::resolve(|key| std::env::var(key).ok(), client_secret)?;
    let oauth_manager = OAuthManager::new(
        oauth_config,
        Arc::new(credential_store),
        Arc::new(ReqwestOAuthClient::new()),
    );

    if matches!(
        oauth_manager.ensure_access_token().await?,
        EnsureTokenResult::ReauthenticationRequired
    ) {
        oauth_manager.authorize_interactively(&mut std::io::stdout()).await?;
    }

    let gateway = GoogleCalendarGateway::new(
        oauth_manager,
        GatewaySettings {
            calendar_id: config.calendar_id.clone(),
            done_color_id: config.done_color_id.clone(),
            page_size: config.page_size,
        },
    );
    info!(
        "event=session status=start calendar_id={} timezone={zone}",
        config.calendar_id
    );

    let stdin = std::io::stdin();
    let console = Console::new(stdin.lock(), std::io::stdout());
    let mut repl = Repl::new(TodoService::new(gateway, zone), console);
    repl.run().await
}
