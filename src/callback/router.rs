//! Callback Router
//!
//! Receives the provider redirect and hands the full URL to whoever is waiting for it

use std::sync::Arc;

use axum::{
    Router,
    extract::{RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::oneshot;

use super::templates;

/// Callback state for handlers
#[derive(Clone)]
pub struct CallbackState {
    redirect_base: Url,
    sender: Arc<Mutex<Option<oneshot::Sender<Url>>>>,
}

impl CallbackState {
    pub fn new(redirect_base: Url, sender: oneshot::Sender<Url>) -> Self {
        Self {
            redirect_base,
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }
}

/// Create callback router
pub fn create_callback_router(path: &str, state: CallbackState) -> Router {
    Router::new()
        .route(path, get(handle_callback))
        .with_state(state)
}

/// Rebuild the redirect URL the provider sent the browser to
pub fn redirect_url(base: &Url, query: Option<&str>) -> Url {
    let mut url = base.clone();
    url.set_query(query.filter(|q| !q.is_empty()));
    url
}

/// `error` the provider put on the redirect instead of a code (e.g. `access_denied`)
pub fn provider_error(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "error")
        .map(|(_, value)| value.into_owned())
}

/// Handle provider redirect (GET {callbackPath})
async fn handle_callback(State(state): State<CallbackState>, RawQuery(query): RawQuery) -> Response {
    let url = redirect_url(&state.redirect_base, query.as_deref());

    let denied = provider_error(&url);

    let sender = state.sender.lock().take();
    match sender {
        Some(sender) => {
            if sender.send(url).is_err() {
                tracing::warn!("Redirect received but nobody is waiting for it");
            }
        }
        None => {
            tracing::debug!("Ignoring repeated redirect");
            return render(
                StatusCode::CONFLICT,
                templates::render_error_page("This authorization was already received."),
            );
        }
    }

    match denied {
        Some(error) => render(StatusCode::BAD_REQUEST, templates::render_error_page(&error)),
        None => render(StatusCode::OK, templates::render_received_page()),
    }
}

fn render(status: StatusCode, html: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}
