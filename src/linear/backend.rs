//! Remote collaborator contract
//!
//! Every remote call the integration makes goes through [`LinearBackend`], so the
//! flow can run against the real API or a scripted test double.

use async_trait::async_trait;

use super::types::{ContextResponse, TeamDescriptor, TokenResponse};

#[async_trait]
pub trait LinearBackend: Send + Sync {
    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str) -> anyhow::Result<TokenResponse>;

    /// Fetch the viewer identity and team list for an access token
    async fn fetch_context(&self, access_token: &str) -> anyhow::Result<ContextResponse>;

    /// Whether a webhook integration is already installed for the team
    async fn check_existing(&self, team_id: &str) -> anyhow::Result<bool>;

    /// Persist the integration context for the team
    async fn save_context(&self, access_token: &str, team: &TeamDescriptor) -> anyhow::Result<()>;

    /// Provision the webhook for the team
    async fn install_webhook(&self, access_token: &str, team_id: &str) -> anyhow::Result<()>;
}
