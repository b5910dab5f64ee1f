//! Auth flow controller
//!
//! Drives `Idle → AwaitingCode → ExchangingToken → Authenticated → ContextLoading → Ready`,
//! with `Error` reachable from the three middle steps. Every remote step is guarded so it
//! runs at most once, and results arriving after a restart (`begin_auth`) are dropped.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::linear::types::{TeamDescriptor, TokenResponse, UserDescriptor};
use crate::linear::{LinearBackend, authorization_url};
use crate::model::config::Config;

use super::error::IntegrationError;
use super::host::IntegrationHost;
use super::location::Location;
use super::storage::{CONTEXT_KEY, Storage};
use super::types::{AuthState, ReadySession, token_fingerprint};
use super::verifier::CsrfVerifier;

struct ControllerInner {
    state: AuthState,
    /// Bumped on every restart; completions from an older epoch are discarded
    epoch: u64,
    access_token: Option<String>,
    exchange_attempted: bool,
    context_in_flight: bool,
    auth_notified: bool,
    user: Option<UserDescriptor>,
    teams: Vec<TeamDescriptor>,
}

impl ControllerInner {
    fn new(epoch: u64) -> Self {
        Self {
            state: AuthState::Idle,
            epoch,
            access_token: None,
            exchange_attempted: false,
            context_in_flight: false,
            auth_notified: false,
            user: None,
            teams: Vec::new(),
        }
    }
}

/// Auth flow controller
pub struct AuthFlowController {
    config: Config,
    verifier: CsrfVerifier,
    storage: Arc<dyn Storage>,
    location: Arc<dyn Location>,
    backend: Arc<dyn LinearBackend>,
    host: Arc<dyn IntegrationHost>,
    inner: Mutex<ControllerInner>,
}

impl AuthFlowController {
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        location: Arc<dyn Location>,
        backend: Arc<dyn LinearBackend>,
        host: Arc<dyn IntegrationHost>,
    ) -> Self {
        Self {
            config,
            verifier: CsrfVerifier::new(storage.clone()),
            storage,
            location,
            backend,
            host,
            inner: Mutex::new(ControllerInner::new(0)),
        }
    }

    /// Start (or restart) the flow
    ///
    /// Drops any active token and loaded context, stores a fresh verification token and
    /// returns the authorization URL to send the user to.
    pub fn begin_auth(&self) -> anyhow::Result<String> {
        {
            let mut inner = self.inner.lock();
            let epoch = inner.epoch + 1;
            *inner = ControllerInner::new(epoch);
        }

        let state = self.verifier.begin_verification()?;
        let url = authorization_url(&self.config, &state)?;
        tracing::info!("Linear authorization started");
        Ok(url)
    }

    /// Adopt an access token from a previous session, skipping the code exchange
    pub fn restore_session(&self, access_token: impl Into<String>) -> AuthState {
        let access_token = access_token.into();
        let mut inner = self.inner.lock();

        if inner.access_token.is_some() {
            tracing::warn!("Access token already active, ignoring restored session");
            return inner.state;
        }

        tracing::info!(
            "Restored session with token {}",
            token_fingerprint(&access_token)
        );
        inner.access_token = Some(access_token);
        inner.state = AuthState::Authenticated;
        inner.state
    }

    /// Inspect the location for a provider redirect and exchange its code
    ///
    /// - No `code`: stays `Idle`
    /// - Foreign `state`: back to `Idle`, nothing reported
    /// - Mismatched `state`: `Error`, alerted, no exchange
    /// - Otherwise the code is exchanged once; later calls are no-ops
    pub async fn handle_redirect(&self) -> Result<AuthState, IntegrationError> {
        let (code, epoch) = {
            let mut inner = self.inner.lock();

            if inner.state != AuthState::Idle || inner.exchange_attempted {
                tracing::debug!("Redirect already handled (state {:?})", inner.state);
                return Ok(inner.state);
            }

            let Some(code) = self.location.query_param("code") else {
                return Ok(inner.state);
            };
            inner.state = AuthState::AwaitingCode;

            let returned_state = self.location.query_param("state").unwrap_or_default();
            if let Err(e) = self.verifier.validate_return(&returned_state) {
                let err = IntegrationError::from(e);
                if err.is_silent() {
                    tracing::debug!("Redirect state has no Linear marker, ignoring");
                    inner.state = AuthState::Idle;
                    return Ok(inner.state);
                }
                drop(inner);
                tracing::warn!("{}", err);
                return Err(self.fail(err));
            }

            inner.exchange_attempted = true;
            inner.state = AuthState::ExchangingToken;
            (code, inner.epoch)
        };

        tracing::info!("Exchanging authorization code");
        let result = self.backend.exchange_code(&code).await;

        if self.inner.lock().epoch != epoch {
            tracing::debug!("Flow restarted during code exchange, discarding result");
            return Ok(self.state());
        }

        self.location.clear_query();

        let access_token = match result {
            Ok(TokenResponse {
                access_token: Some(token),
                ..
            }) if !token.is_empty() => token,
            Ok(_) => return Err(self.exchange_failed("response has no access token".to_string())),
            Err(e) => return Err(self.exchange_failed(e.to_string())),
        };

        tracing::info!(
            "Code exchange succeeded, token {}",
            token_fingerprint(&access_token)
        );

        let mut inner = self.inner.lock();
        inner.access_token = Some(access_token);
        inner.state = AuthState::Authenticated;
        Ok(inner.state)
    }

    /// Announce the token and load the user/team context
    ///
    /// Runs only from `Authenticated` while no user is known and no fetch is in flight.
    pub async fn load_context(&self) -> Result<AuthState, IntegrationError> {
        let (access_token, notify, epoch) = {
            let mut inner = self.inner.lock();

            if inner.state != AuthState::Authenticated
                || inner.user.is_some()
                || inner.context_in_flight
            {
                tracing::debug!("Context load skipped (state {:?})", inner.state);
                return Ok(inner.state);
            }

            let Some(access_token) = inner.access_token.clone() else {
                return Ok(inner.state);
            };

            inner.context_in_flight = true;
            inner.state = AuthState::ContextLoading;
            let notify = !inner.auth_notified;
            inner.auth_notified = true;
            (access_token, notify, inner.epoch)
        };

        if notify {
            self.host.on_auth(&access_token);
        }

        let result = self.backend.fetch_context(&access_token).await;

        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            tracing::debug!("Flow restarted during context load, discarding result");
            return Ok(inner.state);
        }
        inner.context_in_flight = false;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                drop(inner);
                return Err(self.fail(IntegrationError::ContextFetchFailed(e.to_string())));
            }
        };

        let (teams, viewer) = match (response.teams, response.viewer) {
            (Some(teams), Some(viewer)) => (teams.nodes, viewer),
            (None, _) => {
                drop(inner);
                return Err(self.fail(IntegrationError::ContextFetchFailed(
                    "response has no team list".to_string(),
                )));
            }
            (_, None) => {
                drop(inner);
                return Err(self.fail(IntegrationError::ContextFetchFailed(
                    "response has no viewer".to_string(),
                )));
            }
        };

        tracing::info!("Loaded {} team(s) for user {}", teams.len(), viewer.id);
        inner.user = Some(viewer);
        inner.teams = teams;
        inner.state = AuthState::Ready;
        Ok(inner.state)
    }

    /// Handle the redirect, then load context once authenticated
    pub async fn run(&self) -> Result<AuthState, IntegrationError> {
        let state = self.handle_redirect().await?;
        if state == AuthState::Authenticated {
            return self.load_context().await;
        }
        Ok(state)
    }

    pub fn state(&self) -> AuthState {
        self.inner.lock().state
    }

    #[cfg(test)]
    pub fn access_token(&self) -> Option<String> {
        self.inner.lock().access_token.clone()
    }

    #[cfg(test)]
    pub fn user(&self) -> Option<UserDescriptor> {
        self.inner.lock().user.clone()
    }

    #[cfg(test)]
    pub fn teams(&self) -> Vec<TeamDescriptor> {
        self.inner.lock().teams.clone()
    }

    /// Token, user and teams once `Ready`
    pub fn session(&self) -> Option<ReadySession> {
        let inner = self.inner.lock();
        if inner.state != AuthState::Ready {
            return None;
        }
        Some(ReadySession {
            access_token: inner.access_token.clone()?,
            user: inner.user.clone()?,
            teams: inner.teams.clone(),
        })
    }

    /// Clear stale provider context and fail the exchange
    fn exchange_failed(&self, msg: String) -> IntegrationError {
        if let Err(e) = self.storage.remove(CONTEXT_KEY) {
            tracing::warn!("Failed to clear stored Linear context: {}", e);
        }
        self.fail(IntegrationError::TokenExchangeFailed(msg))
    }

    /// Move to `Error` and alert the user
    ///
    /// Silent errors never get here; `handle_redirect` turns them back into `Idle`.
    fn fail(&self, err: IntegrationError) -> IntegrationError {
        self.inner.lock().state = AuthState::Error;
        tracing::error!("{}", err);
        self.host.alert(&err);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::location::UrlLocation;
    use crate::integration::storage::{MemoryStorage, VERIFICATION_KEY};
    use crate::integration::testing::{MockBackend, RecordingHost, context_response, team};
    use crate::linear::types::{TeamConnection, ContextResponse};

    struct Harness {
        controller: AuthFlowController,
        storage: Arc<MemoryStorage>,
        location: Arc<UrlLocation>,
        backend: Arc<MockBackend>,
        host: Arc<RecordingHost>,
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.client_id = Some("client-1".to_string());
        config
    }

    fn harness(url: &str, stored_state: Option<&str>) -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        if let Some(state) = stored_state {
            storage.set(VERIFICATION_KEY, state).unwrap();
        }
        let location = Arc::new(UrlLocation::parse(url).unwrap());
        let backend = MockBackend::new();
        let host = RecordingHost::new();
        let controller = AuthFlowController::new(
            config(),
            storage.clone(),
            location.clone(),
            backend.clone(),
            host.clone(),
        );
        Harness {
            controller,
            storage,
            location,
            backend,
            host,
        }
    }

    const CALLBACK: &str = "http://127.0.0.1:8765/callback";

    #[tokio::test]
    async fn test_no_code_stays_idle() {
        let h = harness(CALLBACK, Some("linear-uuid1"));
        assert_eq!(h.controller.run().await, Ok(AuthState::Idle));
        assert_eq!(h.backend.exchange_count(), 0);
        assert!(h.host.alerts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_matching_state_exchanges_and_fires_on_auth_once() {
        let h = harness(
            "http://127.0.0.1:8765/callback?code=abc&state=linear-uuid1",
            Some("linear-uuid1"),
        );

        assert_eq!(h.controller.run().await, Ok(AuthState::Ready));
        assert_eq!(*h.backend.exchange_calls.lock(), vec!["abc".to_string()]);
        assert_eq!(*h.host.auths.lock(), vec!["tok".to_string()]);
        assert_eq!(h.controller.access_token().as_deref(), Some("tok"));
        assert_eq!(h.controller.user().unwrap().id, "user-1");
        assert_eq!(h.controller.teams().len(), 2);

        // query stripped so a reload cannot replay the exchange
        assert!(h.location.query_param("code").is_none());

        // re-running the flow does nothing new
        assert_eq!(h.controller.run().await, Ok(AuthState::Ready));
        assert_eq!(h.backend.exchange_count(), 1);
        assert_eq!(h.host.auths.lock().len(), 1);
        assert_eq!(h.backend.context_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_foreign_state_ignored_silently() {
        let h = harness(
            "http://127.0.0.1:8765/callback?code=abc&state=other-provider-uuid",
            Some("linear-uuid1"),
        );

        assert_eq!(h.controller.handle_redirect().await, Ok(AuthState::Idle));
        assert_eq!(h.backend.exchange_count(), 0);
        assert!(h.host.alerts.lock().is_empty());
        assert_eq!(h.controller.state(), AuthState::Idle);
    }

    #[tokio::test]
    async fn test_foreign_redirect_leaves_flow_waiting() {
        let h = harness(
            "http://127.0.0.1:8765/callback?code=abc&state=github-uuid2",
            Some("linear-uuid1"),
        );

        // run neither fails nor alerts, so the caller can wait for the next redirect
        assert_eq!(h.controller.run().await, Ok(AuthState::Idle));
        assert!(h.host.alerts.lock().is_empty());
        assert!(h.host.auths.lock().is_empty());
        assert_eq!(h.backend.context_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        // verification token kept for the real redirect
        assert_eq!(h.storage.get(VERIFICATION_KEY).as_deref(), Some("linear-uuid1"));
    }

    #[tokio::test]
    async fn test_mismatched_state_alerts_without_exchange() {
        let h = harness(
            "http://127.0.0.1:8765/callback?code=abc&state=linear-uuidX",
            Some("linear-uuidY"),
        );

        assert_eq!(
            h.controller.handle_redirect().await,
            Err(IntegrationError::CsrfMismatch)
        );
        assert_eq!(h.controller.state(), AuthState::Error);
        assert_eq!(h.backend.exchange_count(), 0);
        assert_eq!(*h.host.alerts.lock(), vec![IntegrationError::CsrfMismatch]);

        // halted: a second pass neither retries nor re-alerts
        assert_eq!(h.controller.handle_redirect().await, Ok(AuthState::Error));
        assert_eq!(h.backend.exchange_count(), 0);
        assert_eq!(h.host.alerts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_state_parameter_is_foreign() {
        let h = harness("http://127.0.0.1:8765/callback?code=abc", Some("linear-uuid1"));
        assert_eq!(h.controller.handle_redirect().await, Ok(AuthState::Idle));
        assert_eq!(h.backend.exchange_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_redirect_handling_exchanges_once() {
        let h = harness(
            "http://127.0.0.1:8765/callback?code=abc&state=linear-uuid1",
            Some("linear-uuid1"),
        );
        let gate = h.backend.gate_exchange();

        let (first, second, _) = tokio::join!(
            h.controller.handle_redirect(),
            h.controller.handle_redirect(),
            async {
                gate.notify_one();
            }
        );

        assert_eq!(first, Ok(AuthState::Authenticated));
        assert_eq!(second, Ok(AuthState::ExchangingToken));
        assert_eq!(h.backend.exchange_count(), 1);
    }

    #[tokio::test]
    async fn test_exchange_failure_clears_context_and_query() {
        let h = harness(
            "http://127.0.0.1:8765/callback?code=abc&state=linear-uuid1",
            Some("linear-uuid1"),
        );
        h.storage.set(CONTEXT_KEY, r#"{"apiKey":"old"}"#).unwrap();
        h.backend.fail_exchange("invalid_grant");

        let result = h.controller.run().await;
        assert!(matches!(result, Err(IntegrationError::TokenExchangeFailed(_))));
        assert_eq!(h.controller.state(), AuthState::Error);
        assert!(h.storage.get(CONTEXT_KEY).is_none());
        assert!(h.location.query_param("code").is_none());
        assert!(h.location.query_param("state").is_none());
        assert!(h.host.auths.lock().is_empty());
        assert_eq!(h.host.alerts.lock().len(), 1);

        // verification token is left in place
        assert!(h.storage.get(VERIFICATION_KEY).is_some());
    }

    #[tokio::test]
    async fn test_exchange_without_access_token_fails() {
        let h = harness(
            "http://127.0.0.1:8765/callback?code=abc&state=linear-uuid1",
            Some("linear-uuid1"),
        );
        h.backend.token_missing();

        let result = h.controller.handle_redirect().await;
        assert_eq!(
            result,
            Err(IntegrationError::TokenExchangeFailed(
                "response has no access token".to_string()
            ))
        );
        assert!(h.controller.access_token().is_none());
    }

    #[tokio::test]
    async fn test_restored_session_skips_exchange() {
        let h = harness(
            "http://127.0.0.1:8765/callback?code=abc&state=linear-uuid1",
            Some("linear-uuid1"),
        );

        assert_eq!(h.controller.restore_session("restored"), AuthState::Authenticated);
        assert_eq!(h.controller.run().await, Ok(AuthState::Ready));
        assert_eq!(h.backend.exchange_count(), 0);
        assert_eq!(*h.host.auths.lock(), vec!["restored".to_string()]);
    }

    #[tokio::test]
    async fn test_restore_ignored_when_token_active() {
        let h = harness(CALLBACK, None);
        h.controller.restore_session("first");
        h.controller.restore_session("second");
        assert_eq!(h.controller.access_token().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_context_without_viewer_fails() {
        let h = harness(CALLBACK, None);
        h.backend.set_context(ContextResponse {
            teams: Some(TeamConnection {
                nodes: vec![team("t1", "Core")],
            }),
            viewer: None,
        });
        h.controller.restore_session("tok");

        let result = h.controller.load_context().await;
        assert_eq!(
            result,
            Err(IntegrationError::ContextFetchFailed("response has no viewer".to_string()))
        );
        assert_eq!(h.controller.state(), AuthState::Error);
        assert!(h.controller.session().is_none());
        assert_eq!(h.host.alerts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_context_without_teams_fails() {
        let h = harness(CALLBACK, None);
        h.backend.set_context(ContextResponse {
            teams: None,
            viewer: Some(UserDescriptor {
                id: "user-1".to_string(),
            }),
        });
        h.controller.restore_session("tok");

        let result = h.controller.load_context().await;
        assert!(matches!(result, Err(IntegrationError::ContextFetchFailed(_))));
    }

    #[tokio::test]
    async fn test_empty_team_list_is_ready() {
        let h = harness(CALLBACK, None);
        h.backend.set_context(context_response("user-1", vec![]));
        h.controller.restore_session("tok");

        assert_eq!(h.controller.load_context().await, Ok(AuthState::Ready));
        let session = h.controller.session().unwrap();
        assert!(session.teams.is_empty());
        assert_eq!(session.user.id, "user-1");
        assert!(h.host.alerts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_context_transport_error_fails() {
        let h = harness(CALLBACK, None);
        h.backend.fail_context("timeout");
        h.controller.restore_session("tok");

        let result = h.controller.load_context().await;
        assert_eq!(
            result,
            Err(IntegrationError::ContextFetchFailed("timeout".to_string()))
        );
    }

    #[tokio::test]
    async fn test_load_context_requires_authentication() {
        let h = harness(CALLBACK, None);
        assert_eq!(h.controller.load_context().await, Ok(AuthState::Idle));
        assert_eq!(h.backend.context_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(h.host.auths.lock().is_empty());
    }

    #[tokio::test]
    async fn test_begin_auth_resets_and_stores_token() {
        let h = harness(CALLBACK, None);
        h.controller.restore_session("tok");
        h.controller.load_context().await.unwrap();

        let url = h.controller.begin_auth().unwrap();
        let stored = h.storage.get(VERIFICATION_KEY).unwrap();
        assert!(stored.starts_with("linear-"));
        assert!(url.contains(&format!("state={}", stored)));
        assert_eq!(h.controller.state(), AuthState::Idle);
        assert!(h.controller.access_token().is_none());
        assert!(h.controller.user().is_none());
    }

    #[tokio::test]
    async fn test_restart_during_exchange_discards_result() {
        let h = harness(
            "http://127.0.0.1:8765/callback?code=abc&state=linear-uuid1",
            Some("linear-uuid1"),
        );
        let gate = h.backend.gate_exchange();

        let (result, _) = tokio::join!(h.controller.handle_redirect(), async {
            h.controller.begin_auth().unwrap();
            gate.notify_one();
        });

        assert_eq!(result, Ok(AuthState::Idle));
        assert!(h.controller.access_token().is_none());
        assert_eq!(h.controller.state(), AuthState::Idle);
    }
}
