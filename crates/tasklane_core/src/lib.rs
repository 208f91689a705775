//! Client-side session and data-synchronization core for Tasklane.
//! Tracks the authenticated user, gates navigation on it, and keeps task and
//! project collections consistent with the remote backend.

pub mod backend;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod navigation;
pub mod session;
pub mod store;

pub use backend::{
    AuthApi, AuthChangeEvent, AuthListener, BackendError, BackendResult, DataApi, Embed,
    LocalBackend, RemoteBackend, Row, SelectQuery, Table,
};
pub use config::{AppConfig, BackendConfig, ConfigError, Endpoint};
pub use context::AppContext;
pub use error::{SyncError, SyncResult};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::project::{NewProject, Project, ProjectId, ProjectPatch, DEFAULT_PROJECT_COLOR};
pub use model::task::{NewTask, Priority, Task, TaskId, TaskPatch};
pub use model::user::{AuthResponse, AuthSession, Profile, User, UserId};
pub use navigation::{decide, NavigationDecision, NavigationGuard, Route, RouteRequirement, UnknownRoute};
pub use session::{SessionManager, SessionState, SessionWatch};
pub use store::{Entity, EntityStore, ProjectStore, TaskStore};

/// Minimal health-check API for wiring probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
