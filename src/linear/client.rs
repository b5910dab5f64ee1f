//! Linear HTTP backend
//!
//! Token exchange and GraphQL calls go to Linear; the dedup check and context
//! persistence go to the integration service configured by `integrationApiUrl`.

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::http_client::{build_client, describe_status};
use crate::model::config::Config;

use super::backend::LinearBackend;
use super::types::{
    ContextResponse, ExistingWebhookResponse, GraphqlRequest, GraphqlResponse,
    OAuthErrorResponse, SaveContextRequest, TeamDescriptor, TokenResponse, WebhookCreateData,
};

const CONTEXT_QUERY: &str = "query { viewer { id } teams { nodes { id name } } }";

const WEBHOOK_CREATE_MUTATION: &str = "mutation WebhookCreate($input: WebhookCreateInput!) { \
     webhookCreate(input: $input) { success webhook { id } } }";

/// reqwest implementation of [`LinearBackend`]
pub struct HttpLinearBackend {
    config: Config,
    client: Client,
}

impl HttpLinearBackend {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    fn graphql_url(&self) -> String {
        format!("{}/graphql", self.config.linear_api_url.trim_end_matches('/'))
    }

    fn integration_url(&self, path: &str) -> String {
        format!("{}{}", self.config.integration_api_url.trim_end_matches('/'), path)
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        access_token: &str,
        query: &str,
        variables: Option<Value>,
    ) -> anyhow::Result<T> {
        let response = self
            .client
            .post(self.graphql_url())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&GraphqlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{}: {} {}", describe_status(status), status, body);
        }

        let envelope: GraphqlResponse<T> = response.json().await?;
        graphql_data(envelope)
    }
}

/// Unwrap a GraphQL envelope, turning `errors` or a missing `data` into a failure
fn graphql_data<T>(envelope: GraphqlResponse<T>) -> anyhow::Result<T> {
    if !envelope.errors.is_empty() {
        let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
        bail!("GraphQL error: {}", messages.join("; "));
    }
    envelope
        .data
        .ok_or_else(|| anyhow::anyhow!("GraphQL response has no data"))
}

/// `WebhookCreateInput` for a team
fn webhook_input(config: &Config, team_id: &str) -> anyhow::Result<Value> {
    let url = config
        .webhook_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("webhookUrl not set in config file"))?;

    Ok(json!({
        "input": {
            "url": url,
            "teamId": team_id,
            "label": config.webhook_label,
            "resourceTypes": config.webhook_resource_types,
        }
    }))
}

#[async_trait]
impl LinearBackend for HttpLinearBackend {
    async fn exchange_code(&self, code: &str) -> anyhow::Result<TokenResponse> {
        let client_id = self
            .config
            .client_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("clientId not set in config file"))?;
        let client_secret = self
            .config
            .client_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("clientSecret not set in config file"))?;
        let redirect_uri = self.config.effective_redirect_uri();

        let url = format!("{}/oauth/token", self.config.linear_api_url.trim_end_matches('/'));
        let form = [
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "authorization_code"),
        ];

        let response = self.client.post(&url).form(&form).send().await?;

        let status = response.status();
        if status.as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            if let Ok(err_resp) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                match err_resp.error_description {
                    Some(desc) => bail!("Token exchange failed: {} ({})", err_resp.error, desc),
                    None => bail!("Token exchange failed: {}", err_resp.error),
                }
            }
            bail!("Token exchange failed: {}", body);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{}: {} {}", describe_status(status), status, body);
        }

        let result: TokenResponse = response.json().await?;
        Ok(result)
    }

    async fn fetch_context(&self, access_token: &str) -> anyhow::Result<ContextResponse> {
        self.graphql(access_token, CONTEXT_QUERY, None)
            .await
            .context("Failed to fetch teams")
    }

    async fn check_existing(&self, team_id: &str) -> anyhow::Result<bool> {
        let url = self.integration_url(&format!(
            "/linear/webhooks/{}",
            urlencoding::encode(team_id)
        ));

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{}: {} {}", describe_status(status), status, body);
        }

        let result: ExistingWebhookResponse = response.json().await?;
        Ok(result.exists)
    }

    async fn save_context(&self, access_token: &str, team: &TeamDescriptor) -> anyhow::Result<()> {
        let url = self.integration_url("/linear/context");
        let body = SaveContextRequest {
            api_key: access_token,
            team_id: &team.id,
            team_name: &team.name,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{}: {} {}", describe_status(status), status, body);
        }
        Ok(())
    }

    async fn install_webhook(&self, access_token: &str, team_id: &str) -> anyhow::Result<()> {
        let variables = webhook_input(&self.config, team_id)?;
        let data: WebhookCreateData = self
            .graphql(access_token, WEBHOOK_CREATE_MUTATION, Some(variables))
            .await?;

        if !data.webhook_create.success {
            bail!("webhookCreate returned success=false");
        }

        if let Some(webhook) = data.webhook_create.webhook {
            tracing::info!("Webhook {} created for team {}", webhook.id, team_id);
        }
        Ok(())
    }
}
