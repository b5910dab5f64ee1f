//! Integration flow types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::linear::types::{TeamDescriptor, UserDescriptor};

/// Auth flow controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Idle,
    AwaitingCode,
    ExchangingToken,
    Authenticated,
    ContextLoading,
    Ready,
    Error,
}

/// Deployment state of the chosen team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    NotChecked,
    Checking,
    Exists,
    NotDeployed,
    Deploying,
    Deployed,
    /// Dedup check or provisioning failed; the state is unresolved
    Failed,
}

impl DeploymentState {
    /// Whether a manual deploy may start from this state
    pub fn can_deploy(self) -> bool {
        matches!(self, DeploymentState::NotDeployed | DeploymentState::Failed)
    }
}

/// What gets handed to the deploy-notification callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationContext {
    pub user_id: String,
    pub team_id: String,
    pub api_key: String,
}

/// Everything known once the controller reaches `Ready`
#[derive(Debug, Clone)]
pub struct ReadySession {
    pub access_token: String,
    pub user: UserDescriptor,
    pub teams: Vec<TeamDescriptor>,
}

impl ReadySession {
    pub fn context_for(&self, team: &TeamDescriptor) -> IntegrationContext {
        IntegrationContext {
            user_id: self.user.id.clone(),
            team_id: team.id.clone(),
            api_key: self.access_token.clone(),
        }
    }
}

/// Short SHA-256 fingerprint of a token, safe to log
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}
