#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tasklane_core::{
    AuthApi, AuthListener, AuthResponse, AuthSession, BackendError, BackendResult, DataApi, Embed,
    LocalBackend, Row, SelectQuery, Table, User,
};
use tokio::sync::Notify;
use uuid::Uuid;

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";
pub const USERNAME: &str = "ada";

/// In-memory backend that records calls and fails on request.
pub struct ScriptedBackend {
    inner: LocalBackend,
    calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, BackendError>>,
    session_gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            inner: LocalBackend::open_in_memory().unwrap(),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            session_gate: None,
        }
    }

    /// `get_session` blocks until the returned gate is notified.
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let backend = Self {
            session_gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (backend, gate)
    }

    pub fn inner(&self) -> &LocalBackend {
        &self.inner
    }

    /// Makes the next call to `op` fail with `err`.
    pub fn fail_next(&self, op: &'static str, err: BackendError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| **call == op).count()
    }

    fn record(&self, op: &'static str) -> BackendResult<()> {
        self.calls.lock().unwrap().push(op);
        match self.failures.lock().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn outage() -> BackendError {
    BackendError::new("service_unavailable", "backend unavailable").with_status(503)
}

/// Registers the default account and leaves the backend signed out.
pub async fn register_signed_out(backend: &LocalBackend) -> User {
    let response = backend
        .sign_up(EMAIL, PASSWORD, username_metadata(USERNAME))
        .await
        .unwrap();
    backend.sign_out().await.unwrap();
    response.user.unwrap()
}

pub fn username_metadata(username: &str) -> Row {
    let mut metadata = Row::new();
    metadata.insert("username".to_string(), username.into());
    metadata
}

#[async_trait]
impl AuthApi for ScriptedBackend {
    async fn get_session(&self) -> BackendResult<Option<AuthSession>> {
        self.record("get_session")?;
        if let Some(gate) = &self.session_gate {
            gate.notified().await;
        }
        self.inner.get_session().await
    }

    fn on_session_change(&self, listener: AuthListener) {
        self.calls.lock().unwrap().push("on_session_change");
        self.inner.on_session_change(listener);
    }

    async fn get_current_user(&self) -> BackendResult<Option<User>> {
        self.record("get_current_user")?;
        self.inner.get_current_user().await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Row,
    ) -> BackendResult<AuthResponse> {
        self.record("sign_up")?;
        self.inner.sign_up(email, password, metadata).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<AuthResponse> {
        self.record("sign_in")?;
        self.inner.sign_in_with_password(email, password).await
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.record("sign_out")?;
        self.inner.sign_out().await
    }
}

#[async_trait]
impl DataApi for ScriptedBackend {
    async fn select(&self, table: Table, query: &SelectQuery) -> BackendResult<Vec<Row>> {
        self.record("select")?;
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: Table, row: Row, embed: Option<Embed>) -> BackendResult<Row> {
        self.record("insert")?;
        self.inner.insert(table, row, embed).await
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        patch: Row,
        embed: Option<Embed>,
    ) -> BackendResult<Option<Row>> {
        self.record("update")?;
        self.inner.update(table, id, patch, embed).await
    }

    async fn delete(&self, table: Table, id: Uuid) -> BackendResult<()> {
        self.record("delete")?;
        self.inner.delete(table, id).await
    }
}
