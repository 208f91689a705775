//! Remote backend contracts.
//!
//! # Responsibility
//! - Describe the minimum auth and row-level data surface the core consumes.
//! - Keep transport details out of session and store orchestration.
//!
//! # Invariants
//! - Every data call is scoped to the acting user server-side; the core never
//!   re-validates ownership.
//! - Errors are opaque envelopes passed through to callers unmodified.
//!
//! Rows travel as JSON objects so the same contract serves every table.

use crate::model::user::{AuthResponse, AuthSession, User, UserId};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod local;

pub use local::LocalBackend;

/// One backend row keyed by column name.
pub type Row = Map<String, Value>;

pub type BackendResult<T> = Result<T, BackendError>;

/// Opaque backend failure envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// Stable machine-readable code, e.g. `invalid_credentials`.
    pub code: String,
    pub message: String,
    /// HTTP-like status when the backend reports one.
    pub status: Option<u16>,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({}, status {status})", self.message, self.code),
            None => write!(f, "{} ({})", self.message, self.code),
        }
    }
}

impl Error for BackendError {}

/// Data tables reachable through the row API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Tasks,
    Projects,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Projects => "projects",
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Related row embedded into each selected row under `alias`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Embed {
    pub alias: &'static str,
    pub table: Table,
    pub foreign_key: &'static str,
}

impl Embed {
    /// `project:projects(*)` via `tasks.project_id`.
    pub const PROJECT: Embed = Embed {
        alias: "project",
        table: Table::Projects,
        foreign_key: "project_id",
    };
}

/// Owner-filtered select, newest-created first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub owner: UserId,
    pub embed: Option<Embed>,
}

impl SelectQuery {
    pub fn owned_by(owner: UserId) -> Self {
        Self { owner, embed: None }
    }

    pub fn with_embed(mut self, embed: Option<Embed>) -> Self {
        self.embed = embed;
        self
    }
}

/// Kind of auth-state transition reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    /// Delivered once to each new listener with the session at subscribe time.
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl AuthChangeEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "initial_session",
            Self::SignedIn => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed => "token_refreshed",
            Self::UserUpdated => "user_updated",
        }
    }
}

/// Callback invoked on every auth-state transition.
pub type AuthListener = Box<dyn Fn(AuthChangeEvent, Option<&AuthSession>) + Send + Sync>;

/// Auth subsystem of the remote backend.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn get_session(&self) -> BackendResult<Option<AuthSession>>;

    /// Registers a process-lifetime listener.
    fn on_session_change(&self, listener: AuthListener);

    /// Resolves the user behind the current session, verified by the backend.
    async fn get_current_user(&self) -> BackendResult<Option<User>>;

    async fn sign_up(&self, email: &str, password: &str, metadata: Row)
        -> BackendResult<AuthResponse>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> BackendResult<AuthResponse>;

    async fn sign_out(&self) -> BackendResult<()>;
}

/// Row-level data API of the remote backend.
#[async_trait]
pub trait DataApi: Send + Sync {
    async fn select(&self, table: Table, query: &SelectQuery) -> BackendResult<Vec<Row>>;

    /// Inserts one row and returns it re-selected, embeds included.
    async fn insert(&self, table: Table, row: Row, embed: Option<Embed>) -> BackendResult<Row>;

    /// Updates the row with `id`. `Ok(None)` means no visible row matched.
    async fn update(
        &self,
        table: Table,
        id: Uuid,
        patch: Row,
        embed: Option<Embed>,
    ) -> BackendResult<Option<Row>>;

    /// Deletes the row with `id`. Deleting a missing row is not an error.
    async fn delete(&self, table: Table, id: Uuid) -> BackendResult<()>;
}

/// Full backend surface consumed by the core.
pub trait RemoteBackend: AuthApi + DataApi {}

impl<T: AuthApi + DataApi + ?Sized> RemoteBackend for T {}
