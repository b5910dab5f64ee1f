//! Team selection, dedup check and webhook deployment
//!
//! The last `select_team` wins. Each selection bumps a generation counter and a check that
//! completes under an older generation is dropped. A deploy is applied while its team is still
//! the chosen one, even across a reselection of that same team, and dropped otherwise.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::linear::LinearBackend;
use crate::linear::types::TeamDescriptor;

use super::error::IntegrationError;
use super::host::IntegrationHost;
use super::types::{DeploymentState, ReadySession};

struct Selection {
    generation: u64,
    team: Option<TeamDescriptor>,
    state: DeploymentState,
    /// Teams with a deploy in flight, across reselections
    deploying: HashSet<String>,
    /// Teams already reported through `on_deploy_webhook`
    notified: HashSet<String>,
}

/// Deploys the webhook for the chosen team of a ready session
pub struct TeamDeployer {
    session: ReadySession,
    backend: Arc<dyn LinearBackend>,
    host: Arc<dyn IntegrationHost>,
    optimistic_deploy: bool,
    selection: Mutex<Selection>,
}

impl TeamDeployer {
    pub fn new(
        session: ReadySession,
        backend: Arc<dyn LinearBackend>,
        host: Arc<dyn IntegrationHost>,
    ) -> Self {
        Self {
            session,
            backend,
            host,
            optimistic_deploy: false,
            selection: Mutex::new(Selection {
                generation: 0,
                team: None,
                state: DeploymentState::NotChecked,
                deploying: HashSet::new(),
                notified: HashSet::new(),
            }),
        }
    }

    /// Treat a failed provisioning as deployed (state `Deployed`, error still alerted)
    pub fn with_optimistic_deploy(mut self, optimistic: bool) -> Self {
        self.optimistic_deploy = optimistic;
        self
    }

    pub fn state(&self) -> DeploymentState {
        self.selection.lock().state
    }

    pub fn selected_team(&self) -> Option<TeamDescriptor> {
        self.selection.lock().team.clone()
    }

    /// Choose a team and check whether its webhook already exists
    ///
    /// Returns `Ok(None)` when a newer selection superseded this one before the check finished.
    pub async fn select_team(
        &self,
        team: TeamDescriptor,
    ) -> Result<Option<DeploymentState>, IntegrationError> {
        let generation = {
            let mut selection = self.selection.lock();
            selection.generation += 1;
            selection.team = Some(team.clone());
            selection.state = DeploymentState::Checking;
            selection.generation
        };

        tracing::info!("Checking existing webhook for team {} ({})", team.name, team.id);
        let result = self.backend.check_existing(&team.id).await;

        let mut selection = self.selection.lock();
        if selection.generation != generation {
            tracing::debug!("Discarding stale dedup result for team {}", team.id);
            return Ok(None);
        }

        match result {
            Ok(true) => {
                selection.state = DeploymentState::Exists;
                let first = selection.notified.insert(team.id.clone());
                drop(selection);

                tracing::info!("Webhook already installed for team {}", team.id);
                if first {
                    self.host.on_deploy_webhook(&self.session.context_for(&team));
                }
                Ok(Some(DeploymentState::Exists))
            }
            Ok(false) if selection.notified.contains(&team.id) => {
                // provisioned by a deploy that finished while this check was in flight
                selection.state = DeploymentState::Deployed;
                Ok(Some(DeploymentState::Deployed))
            }
            Ok(false) => {
                selection.state = DeploymentState::NotDeployed;
                Ok(Some(DeploymentState::NotDeployed))
            }
            Err(e) => {
                // unresolved, a manual deploy stays possible
                selection.state = DeploymentState::Failed;
                drop(selection);

                let err = IntegrationError::DedupCheckFailed(e.to_string());
                tracing::warn!("{}", err);
                self.host.alert(&err);
                Err(err)
            }
        }
    }

    /// Persist the context and provision the webhook for the chosen team
    ///
    /// No-op unless a team is chosen, its state allows deploying (`NotDeployed` or `Failed`)
    /// and no deploy is already in flight for it. Returns the resulting state.
    pub async fn deploy(&self) -> Result<DeploymentState, IntegrationError> {
        let team = {
            let mut selection = self.selection.lock();

            let Some(team) = selection.team.clone() else {
                tracing::debug!("No team selected, skipping deploy");
                return Ok(selection.state);
            };

            if !selection.state.can_deploy() || selection.deploying.contains(&team.id) {
                tracing::debug!(
                    "Deploy skipped for team {} (state {:?})",
                    team.id,
                    selection.state
                );
                return Ok(selection.state);
            }

            selection.state = DeploymentState::Deploying;
            selection.deploying.insert(team.id.clone());
            team
        };

        tracing::info!("Deploying webhook for team {} ({})", team.name, team.id);
        let access_token = self.session.access_token.as_str();
        let (saved, installed) = tokio::join!(
            self.backend.save_context(access_token, &team),
            self.backend.install_webhook(access_token, &team.id),
        );

        let mut selection = self.selection.lock();
        selection.deploying.remove(&team.id);

        let still_chosen = selection.team.as_ref().is_some_and(|t| t.id == team.id);
        if !still_chosen {
            tracing::info!(
                "Team changed during deploy, result for team {} not applied (saved: {}, installed: {})",
                team.id,
                saved.is_ok(),
                installed.is_ok()
            );
            return Ok(selection.state);
        }

        let state = match &installed {
            Ok(()) => DeploymentState::Deployed,
            Err(_) if self.optimistic_deploy => DeploymentState::Deployed,
            Err(_) => DeploymentState::Failed,
        };
        selection.state = state;
        let first = installed.is_ok() && selection.notified.insert(team.id.clone());
        drop(selection);

        if let Err(e) = saved {
            let err = IntegrationError::PersistFailed(e.to_string());
            tracing::error!("{}", err);
            self.host.alert(&err);
        }

        match installed {
            Ok(()) => {
                tracing::info!("Webhook deployed for team {}", team.id);
                if first {
                    self.host.on_deploy_webhook(&self.session.context_for(&team));
                }
                Ok(state)
            }
            Err(e) => {
                let err = IntegrationError::ProvisionFailed(e.to_string());
                tracing::error!("{}", err);
                self.host.alert(&err);
                Err(err)
            }
        }
    }
}
