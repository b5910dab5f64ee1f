use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TlsBackend {
    #[default]
    Rustls,
    NativeTls,
}

/// Linear webhook installer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Callback server bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Callback server bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path the provider redirects back to
    #[serde(default = "default_callback_path")]
    pub callback_path: String,

    /// Redirect URI registered with the OAuth application.
    /// Falls back to http://{host}:{port}{callbackPath} if not configured
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// OAuth application client ID
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth application client secret (used for the code exchange)
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Comma separated OAuth scopes
    #[serde(default = "default_scopes")]
    pub scopes: String,

    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    /// Linear API base URL (token exchange and GraphQL)
    #[serde(default = "default_linear_api_url")]
    pub linear_api_url: String,

    /// Integration service base URL (dedup check and context persistence)
    #[serde(default = "default_integration_api_url")]
    pub integration_api_url: String,

    /// URL Linear pushes webhook events to
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_webhook_label")]
    pub webhook_label: String,

    /// Resource types the webhook subscribes to
    #[serde(default = "default_webhook_resource_types")]
    pub webhook_resource_types: Vec<String>,

    /// Key-value store file (verification token, integration context)
    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    #[serde(default)]
    pub tls_backend: TlsBackend,

    /// HTTP proxy URL (optional)
    /// Supported formats: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Proxy authentication username (optional)
    #[serde(default)]
    pub proxy_username: Option<String>,

    /// Proxy authentication password (optional)
    #[serde(default)]
    pub proxy_password: Option<String>,

    /// Remote call timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Mark a team deployed even when webhook provisioning fails
    #[serde(default)]
    pub optimistic_deploy: bool,

    /// Config file path (runtime metadata, not written to JSON)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_callback_path() -> String {
    "/callback".to_string()
}

fn default_scopes() -> String {
    "read,write,admin".to_string()
}

fn default_authorize_url() -> String {
    "https://linear.app/oauth/authorize".to_string()
}

fn default_linear_api_url() -> String {
    "https://api.linear.app".to_string()
}

fn default_integration_api_url() -> String {
    "http://127.0.0.1:8080/api/integrations".to_string()
}

fn default_webhook_label() -> String {
    "linear-webhook-rs".to_string()
}

fn default_webhook_resource_types() -> Vec<String> {
    vec!["Issue".to_string(), "Comment".to_string()]
}

fn default_storage_path() -> String {
    "linear-state.json".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            callback_path: default_callback_path(),
            redirect_uri: None,
            client_id: None,
            client_secret: None,
            scopes: default_scopes(),
            authorize_url: default_authorize_url(),
            linear_api_url: default_linear_api_url(),
            integration_api_url: default_integration_api_url(),
            webhook_url: None,
            webhook_label: default_webhook_label(),
            webhook_resource_types: default_webhook_resource_types(),
            storage_path: default_storage_path(),
            tls_backend: TlsBackend::default(),
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            request_timeout_secs: default_request_timeout_secs(),
            optimistic_deploy: false,
            config_path: None,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// Get effective redirect URI
    /// Prefers redirect_uri, falls back to the local callback server address
    pub fn effective_redirect_uri(&self) -> String {
        match &self.redirect_uri {
            Some(uri) => uri.clone(),
            None => format!("http://{}:{}{}", self.host, self.port, self.callback_path),
        }
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // Config file doesn't exist, return default config
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get config file path (if available)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
