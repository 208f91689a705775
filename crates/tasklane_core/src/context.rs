//! Explicitly constructed application state.
//!
//! One backend handle is shared by the session manager, both stores and the
//! navigation guard. The container is created at process start and torn down
//! with [`AppContext::shutdown`]; nothing here is a process-global.

use crate::backend::RemoteBackend;
use crate::navigation::NavigationGuard;
use crate::session::SessionManager;
use crate::store::{ProjectStore, TaskStore};
use log::info;
use std::sync::Arc;

pub struct AppContext<B: RemoteBackend + ?Sized> {
    pub session: Arc<SessionManager<B>>,
    pub tasks: TaskStore<B>,
    pub projects: ProjectStore<B>,
    pub guard: NavigationGuard<B>,
}

impl<B: RemoteBackend + ?Sized> AppContext<B> {
    /// Wires components without initializing the session.
    ///
    /// Navigations checked before [`SessionManager::initialize`] completes
    /// wait for it.
    pub fn new(backend: Arc<B>) -> Self {
        let session = Arc::new(SessionManager::new(Arc::clone(&backend)));
        Self {
            guard: NavigationGuard::new(Arc::clone(&session)),
            tasks: TaskStore::new(Arc::clone(&backend)),
            projects: ProjectStore::new(backend),
            session,
        }
    }

    /// Wires components and resolves the initial session.
    pub async fn start(backend: Arc<B>) -> Self {
        let context = Self::new(backend);
        context.session.initialize().await;
        info!(
            "event=context_start module=context status=ok authenticated={}",
            context.session.is_authenticated()
        );
        context
    }

    /// Drops cached collections. The auth subscription lives as long as the
    /// backend handle.
    pub fn shutdown(self) {
        self.tasks.clear();
        self.projects.clear();
        info!("event=context_shutdown module=context status=ok");
    }
}
