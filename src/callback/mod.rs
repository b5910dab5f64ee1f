//! Local redirect receiver
//!
//! Serves the redirect URI on `host:port` just long enough to capture one provider redirect.

mod router;
mod templates;

use anyhow::Context;
use reqwest::Url;
use tokio::sync::oneshot;

use crate::model::config::Config;

pub use router::provider_error;
use router::{CallbackState, create_callback_router};

/// Serve the callback path until the provider redirects back, then shut down
///
/// Returns the full redirect URL (with `code` and `state`).
pub async fn wait_for_redirect(config: &Config) -> anyhow::Result<Url> {
    let redirect_base = Url::parse(&config.effective_redirect_uri())
        .context("Invalid redirect URI")?;

    let (url_tx, url_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = create_callback_router(&config.callback_path, CallbackState::new(redirect_base, url_tx));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind callback server: {}", addr))?;
    tracing::info!("Waiting for Linear redirect on http://{}{}", addr, config.callback_path);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let url = url_rx
        .await
        .context("Callback server stopped before receiving the redirect")?;

    let _ = shutdown_tx.send(());
    server.await??;
    Ok(url)
}
