//! Embedding application callbacks

use super::error::IntegrationError;
use super::types::IntegrationContext;

/// What the flow reports back to whoever embeds it
pub trait IntegrationHost: Send + Sync {
    /// Fired once per session when an access token becomes active
    fn on_auth(&self, access_token: &str);

    /// Fired once per team when its webhook exists or was just deployed
    fn on_deploy_webhook(&self, context: &IntegrationContext);

    /// Blocking user-visible notification
    fn alert(&self, error: &IntegrationError);
}
