//! Outbound authorization URL

use anyhow::bail;

use crate::model::config::Config;

/// Build the Linear authorization URL carrying the verification token as `state`
pub fn authorization_url(config: &Config, state: &str) -> anyhow::Result<String> {
    let client_id = match config.client_id.as_deref() {
        Some(id) if !id.trim().is_empty() => id,
        _ => bail!("clientId not set in config file"),
    };

    let redirect_uri = config.effective_redirect_uri();

    Ok(format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=consent&actor=application",
        config.authorize_url,
        urlencoding::encode(client_id),
        urlencoding::encode(&redirect_uri),
        urlencoding::encode(&config.scopes),
        urlencoding::encode(state),
    ))
}
