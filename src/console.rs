//! Terminal host
//!
//! Shows alerts, keeps the integration context in storage and asks the user which team to use.

use std::sync::Arc;

use dialoguer::{Confirm, Select};

use crate::integration::types::{IntegrationContext, token_fingerprint};
use crate::integration::{CONTEXT_KEY, IntegrationError, IntegrationHost, Storage};
use crate::linear::types::TeamDescriptor;

/// [`IntegrationHost`] for the command line
pub struct ConsoleHost {
    storage: Arc<dyn Storage>,
}

impl ConsoleHost {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

impl IntegrationHost for ConsoleHost {
    fn on_auth(&self, access_token: &str) {
        tracing::info!("Linear connected (token {})", token_fingerprint(access_token));
    }

    fn on_deploy_webhook(&self, context: &IntegrationContext) {
        match serde_json::to_string(context) {
            Ok(json) => {
                if let Err(e) = self.storage.set(CONTEXT_KEY, &json) {
                    tracing::warn!("Failed to store Linear context: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize Linear context: {}", e),
        }
        println!("Webhook active for team {}", context.team_id);
    }

    fn alert(&self, error: &IntegrationError) {
        eprintln!("\n  ! {}\n", error.user_message());
    }
}

/// Access token of a previously stored integration context
pub fn stored_access_token(storage: &dyn Storage) -> Option<String> {
    let json = storage.get(CONTEXT_KEY)?;
    match serde_json::from_str::<IntegrationContext>(&json) {
        Ok(context) if !context.api_key.is_empty() => Some(context.api_key),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Ignoring unreadable stored Linear context: {}", e);
            None
        }
    }
}

/// Ask which team to install the webhook for (`None` if the user backs out)
pub fn pick_team(teams: &[TeamDescriptor]) -> anyhow::Result<Option<TeamDescriptor>> {
    let names: Vec<&str> = teams.iter().map(|t| t.name.as_str()).collect();
    let choice = Select::new()
        .with_prompt("Select a Linear team")
        .items(&names)
        .default(0)
        .interact_opt()?;
    Ok(choice.map(|index| teams[index].clone()))
}

pub fn confirm_deploy(team: &TeamDescriptor) -> anyhow::Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(format!("Install the webhook for {}?", team.name))
        .default(true)
        .interact()?;
    Ok(confirmed)
}
