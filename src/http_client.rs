//! HTTP Client builder module
//!
//! Builds the reqwest client shared by all remote calls, honoring the proxy and TLS settings in config

use reqwest::{Client, Proxy, StatusCode};
use std::time::Duration;

use crate::model::config::{Config, TlsBackend};

/// Build HTTP Client from config
///
/// Uses `requestTimeoutSecs` as the per-request timeout and `proxyUrl` (with optional basic auth)
/// when configured.
pub fn build_client(config: &Config) -> anyhow::Result<Client> {
    let mut builder = Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));

    if config.tls_backend == TlsBackend::Rustls {
        builder = builder.use_rustls_tls();
    }

    if let Some(url) = config.proxy_url.as_deref() {
        let mut proxy = Proxy::all(url)?;

        if let (Some(username), Some(password)) = (&config.proxy_username, &config.proxy_password) {
            proxy = proxy.basic_auth(username, password);
        }

        builder = builder.proxy(proxy);
        tracing::debug!("HTTP Client using proxy: {}", url);
    }

    Ok(builder.build()?)
}

/// Human readable reason for a failed remote call
pub fn describe_status(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "Request rejected",
        401 => "Access token expired or invalid, re-authentication required",
        403 => "Insufficient permissions",
        404 => "Resource not found",
        429 => "Too many requests, rate limited",
        500..=599 => "Server error, service temporarily unavailable",
        _ => "Request failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_without_proxy() {
        let client = build_client(&Config::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_client_with_proxy_auth() {
        let mut config = Config::default();
        config.proxy_url = Some("socks5://127.0.0.1:1080".to_string());
        config.proxy_username = Some("user".to_string());
        config.proxy_password = Some("pass".to_string());
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn test_describe_status() {
        assert_eq!(
            describe_status(StatusCode::UNAUTHORIZED),
            "Access token expired or invalid, re-authentication required"
        );
        assert_eq!(
            describe_status(StatusCode::BAD_GATEWAY),
            "Server error, service temporarily unavailable"
        );
        assert_eq!(describe_status(StatusCode::IM_A_TEAPOT), "Request failed");
    }
}
