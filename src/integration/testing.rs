//! Scripted collaborators for integration flow tests

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::linear::LinearBackend;
use crate::linear::types::{
    ContextResponse, TeamConnection, TeamDescriptor, TokenResponse, UserDescriptor,
};

use super::error::IntegrationError;
use super::host::IntegrationHost;
use super::types::IntegrationContext;

pub(crate) fn team(id: &str, name: &str) -> TeamDescriptor {
    TeamDescriptor {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub(crate) fn context_response(user_id: &str, teams: Vec<TeamDescriptor>) -> ContextResponse {
    ContextResponse {
        teams: Some(TeamConnection { nodes: teams }),
        viewer: Some(UserDescriptor {
            id: user_id.to_string(),
        }),
    }
}

/// Backend answering from a script and recording every call
pub(crate) struct MockBackend {
    token: Mutex<Option<String>>,
    exchange_error: Mutex<Option<String>>,
    exchange_gate: Mutex<Option<Arc<Notify>>>,
    context: Mutex<Result<ContextResponse, String>>,
    existing: Mutex<HashMap<String, bool>>,
    check_gates: Mutex<HashMap<String, Arc<Notify>>>,
    save_error: Mutex<Option<String>>,
    install_error: Mutex<Option<String>>,
    install_gate: Mutex<Option<Arc<Notify>>>,

    pub exchange_calls: Mutex<Vec<String>>,
    pub context_calls: AtomicUsize,
    pub check_calls: Mutex<Vec<String>>,
    pub save_calls: Mutex<Vec<String>>,
    pub install_calls: Mutex<Vec<String>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            token: Mutex::new(Some("tok".to_string())),
            exchange_error: Mutex::new(None),
            exchange_gate: Mutex::new(None),
            context: Mutex::new(Ok(context_response(
                "user-1",
                vec![team("t1", "Core"), team("t2", "Growth")],
            ))),
            existing: Mutex::new(HashMap::new()),
            check_gates: Mutex::new(HashMap::new()),
            save_error: Mutex::new(None),
            install_error: Mutex::new(None),
            install_gate: Mutex::new(None),
            exchange_calls: Mutex::new(Vec::new()),
            context_calls: AtomicUsize::new(0),
            check_calls: Mutex::new(Vec::new()),
            save_calls: Mutex::new(Vec::new()),
            install_calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Token endpoint answers without `access_token`
    pub fn token_missing(&self) {
        *self.token.lock() = None;
    }

    pub fn fail_exchange(&self, msg: &str) {
        *self.exchange_error.lock() = Some(msg.to_string());
    }

    /// Hold the exchange until the returned gate is notified
    pub fn gate_exchange(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.exchange_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn set_context(&self, context: ContextResponse) {
        *self.context.lock() = Ok(context);
    }

    pub fn fail_context(&self, msg: &str) {
        *self.context.lock() = Err(msg.to_string());
    }

    /// Dedup answer for a team; teams without an answer fail the check
    pub fn set_existing(&self, team_id: &str, exists: bool) {
        self.existing.lock().insert(team_id.to_string(), exists);
    }

    /// Hold the dedup check for a team until the returned gate is notified
    pub fn gate_check(&self, team_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.check_gates.lock().insert(team_id.to_string(), gate.clone());
        gate
    }

    pub fn fail_save(&self, msg: &str) {
        *self.save_error.lock() = Some(msg.to_string());
    }

    pub fn fail_install(&self, msg: &str) {
        *self.install_error.lock() = Some(msg.to_string());
    }

    /// Hold webhook provisioning until the returned gate is notified
    pub fn gate_install(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.install_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_calls.lock().len()
    }

    pub fn install_count(&self) -> usize {
        self.install_calls.lock().len()
    }
}

#[async_trait]
impl LinearBackend for MockBackend {
    async fn exchange_code(&self, code: &str) -> anyhow::Result<TokenResponse> {
        self.exchange_calls.lock().push(code.to_string());

        let gate = self.exchange_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let error = self.exchange_error.lock().clone();
        if let Some(msg) = error {
            anyhow::bail!(msg);
        }
        Ok(TokenResponse {
            access_token: self.token.lock().clone(),
            ..TokenResponse::default()
        })
    }

    async fn fetch_context(&self, _access_token: &str) -> anyhow::Result<ContextResponse> {
        self.context_calls.fetch_add(1, Ordering::SeqCst);
        let context = self.context.lock().clone();
        context.map_err(|msg| anyhow::anyhow!(msg))
    }

    async fn check_existing(&self, team_id: &str) -> anyhow::Result<bool> {
        self.check_calls.lock().push(team_id.to_string());

        let gate = self.check_gates.lock().get(team_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let exists = self.existing.lock().get(team_id).copied();
        exists.ok_or_else(|| anyhow::anyhow!("connection refused"))
    }

    async fn save_context(&self, _access_token: &str, team: &TeamDescriptor) -> anyhow::Result<()> {
        self.save_calls.lock().push(team.id.clone());
        let error = self.save_error.lock().clone();
        match error {
            Some(msg) => Err(anyhow::anyhow!(msg)),
            None => Ok(()),
        }
    }

    async fn install_webhook(&self, _access_token: &str, team_id: &str) -> anyhow::Result<()> {
        self.install_calls.lock().push(team_id.to_string());

        let gate = self.install_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let error = self.install_error.lock().clone();
        match error {
            Some(msg) => Err(anyhow::anyhow!(msg)),
            None => Ok(()),
        }
    }
}

/// Host recording every callback
#[derive(Default)]
pub(crate) struct RecordingHost {
    pub auths: Mutex<Vec<String>>,
    pub deployed: Mutex<Vec<IntegrationContext>>,
    pub alerts: Mutex<Vec<IntegrationError>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl IntegrationHost for RecordingHost {
    fn on_auth(&self, access_token: &str) {
        self.auths.lock().push(access_token.to_string());
    }

    fn on_deploy_webhook(&self, context: &IntegrationContext) {
        self.deployed.lock().push(context.clone());
    }

    fn alert(&self, error: &IntegrationError) {
        self.alerts.lock().push(error.clone());
    }
}
