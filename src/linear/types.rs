//! Linear API types

use serde::{Deserialize, Serialize};

/// A team the authenticated user belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDescriptor {
    pub id: String,
    pub name: String,
}

/// The authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescriptor {
    pub id: String,
}

/// OAuth token endpoint response
///
/// Only `access_token` matters to the flow; a response without it is a failed exchange.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

/// Team connection as returned by GraphQL (`teams { nodes { .. } }`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamConnection {
    #[serde(default)]
    pub nodes: Vec<TeamDescriptor>,
}

/// User and team context for an access token
///
/// Both fields are optional on the wire; the controller treats a missing one as a fetch failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextResponse {
    pub teams: Option<TeamConnection>,
    pub viewer: Option<UserDescriptor>,
}

/// Dedup check response
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExistingWebhookResponse {
    pub exists: bool,
}

/// Body posted to the integration service when persisting a team context
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveContextRequest<'a> {
    pub api_key: &'a str,
    pub team_id: &'a str,
    pub team_name: &'a str,
}

/// GraphQL request envelope
#[derive(Debug, Serialize)]
pub struct GraphqlRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

/// GraphQL response envelope
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

/// `webhookCreate` mutation payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCreateData {
    pub webhook_create: WebhookCreatePayload,
}

#[derive(Debug, Deserialize)]
pub struct WebhookCreatePayload {
    pub success: bool,
    pub webhook: Option<WebhookNode>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookNode {
    pub id: String,
}

/// OAuth error response (`{"error": "...", "error_description": "..."}`)
#[derive(Debug, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}
