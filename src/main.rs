mod callback;
mod console;
mod http_client;
mod integration;
mod linear;
mod model;

use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use integration::types::{AuthState, DeploymentState};
use integration::{
    AuthFlowController, CONTEXT_KEY, FileStorage, IntegrationError, Storage, TeamDeployer,
    UrlLocation,
};
use linear::{HttpLinearBackend, LinearBackend};
use model::arg::Args;
use model::config::Config;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config_path = args
        .config
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = run(config, args.storage, args.access_token).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(
    config: Config,
    storage_path: Option<String>,
    access_token: Option<String>,
) -> anyhow::Result<()> {
    if let Some(path) = config.config_path() {
        tracing::debug!("Using config file: {}", path.display());
    }

    let storage_path = storage_path.unwrap_or_else(|| config.storage_path.clone());
    let file_storage = FileStorage::open(&storage_path)?;
    tracing::debug!("Using storage file: {}", file_storage.path().display());
    let storage: Arc<dyn Storage> = Arc::new(file_storage);

    let backend: Arc<dyn LinearBackend> = Arc::new(HttpLinearBackend::new(config.clone())?);
    let host = Arc::new(console::ConsoleHost::new(storage.clone()));
    let redirect_uri = config.effective_redirect_uri();

    // Restored session: explicit token first, then the stored integration context
    let restored = access_token.or_else(|| console::stored_access_token(storage.as_ref()));

    let (controller, state) = match restored {
        Some(token) => {
            let controller = AuthFlowController::new(
                config.clone(),
                storage.clone(),
                Arc::new(UrlLocation::parse(&redirect_uri)?),
                backend.clone(),
                host.clone(),
            );
            controller.restore_session(token);

            match controller.run().await {
                Ok(state) => (controller, state),
                Err(e @ IntegrationError::ContextFetchFailed(_)) => {
                    // stored token is no longer usable; next run starts a fresh authorization
                    storage.remove(CONTEXT_KEY)?;
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        None => {
            let launcher = AuthFlowController::new(
                config.clone(),
                storage.clone(),
                Arc::new(UrlLocation::parse(&redirect_uri)?),
                backend.clone(),
                host.clone(),
            );
            let auth_url = launcher.begin_auth()?;
            println!("Open this URL to connect Linear:\n\n  {}\n", auth_url);

            loop {
                let url = callback::wait_for_redirect(&config).await?;
                if let Some(error) = callback::provider_error(&url) {
                    bail!("Linear authorization was not granted: {}", error);
                }

                // Each redirect gets a fresh controller, reading only what storage carried over
                let controller = AuthFlowController::new(
                    config.clone(),
                    storage.clone(),
                    Arc::new(UrlLocation::new(url)),
                    backend.clone(),
                    host.clone(),
                );
                let state = controller.run().await?;
                if state == AuthState::Idle {
                    tracing::info!("Redirect does not belong to this authorization, still waiting");
                    continue;
                }
                break (controller, state);
            }
        }
    };

    let Some(session) = controller.session() else {
        bail!("Linear authorization did not complete (state {:?})", state);
    };

    if session.teams.is_empty() {
        println!("No Linear teams available for this account.");
        return Ok(());
    }

    let Some(team) = console::pick_team(&session.teams)? else {
        return Ok(());
    };

    let deployer = TeamDeployer::new(session, backend, host)
        .with_optimistic_deploy(config.optimistic_deploy);

    // dedup failures are alerted by the deployer and leave the team deployable
    let state = deployer
        .select_team(team.clone())
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| deployer.state());

    match state {
        DeploymentState::Exists => {
            println!("A webhook is already installed for {}.", team.name);
        }
        state if state.can_deploy() => {
            if console::confirm_deploy(&team)? {
                // failures are alerted by the deployer
                let _ = deployer.deploy().await;
            }
            let chosen = deployer.selected_team().unwrap_or(team);
            println!("Deployment state for {}: {:?}", chosen.name, deployer.state());
        }
        state => {
            println!("Deployment state for {}: {:?}", team.name, state);
        }
    }

    Ok(())
}
