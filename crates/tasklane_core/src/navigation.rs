//! Navigation gating on authentication state.
//!
//! # Responsibility
//! - Map paths to named routes and their access requirement.
//! - Decide allow/redirect for every navigation once the session has settled.
//!
//! # Invariants
//! - No navigation is decided while the session is still loading; the guard
//!   waits on a session subscription rather than polling.
//! - Redirect targets are always reachable in the state that caused the
//!   redirect, so decisions never loop.

use crate::backend::AuthApi;
use crate::session::SessionManager;
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

/// Named navigation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Auth,
    Tasks,
    Projects,
    Profile,
}

/// Access requirement declared by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRequirement {
    /// Only reachable with an authenticated user.
    Authenticated,
    /// Only reachable without an authenticated user.
    Guest,
}

impl Route {
    pub const ALL: [Route; 4] = [Route::Auth, Route::Tasks, Route::Projects, Route::Profile];

    /// Where unauthenticated users are sent.
    pub const SIGN_IN: Route = Route::Auth;

    /// Where authenticated users land.
    pub const DEFAULT_AUTHENTICATED: Route = Route::Tasks;

    pub fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Tasks => "tasks",
            Self::Projects => "projects",
            Self::Profile => "profile",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Auth => "/auth",
            Self::Tasks => "/tasks",
            Self::Projects => "/projects",
            Self::Profile => "/profile",
        }
    }

    pub fn requirement(self) -> RouteRequirement {
        match self {
            Self::Auth => RouteRequirement::Guest,
            Self::Tasks | Self::Projects | Self::Profile => RouteRequirement::Authenticated,
        }
    }

    /// Resolves a path. `/` is an alias of the default authenticated route.
    pub fn from_path(path: &str) -> Option<Route> {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" if trimmed.starts_with('/') => return Some(Self::DEFAULT_AUTHENTICATED),
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|route| route.path() == normalized)
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of one navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Redirect(Route),
}

/// Navigation to a path that names no route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRoute(pub String);

impl Display for UnknownRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "no route matches path `{}`", self.0)
    }
}

impl Error for UnknownRoute {}

/// Pure decision for a settled session.
pub fn decide(target: Route, authenticated: bool) -> NavigationDecision {
    match (target.requirement(), authenticated) {
        (RouteRequirement::Authenticated, false) => NavigationDecision::Redirect(Route::SIGN_IN),
        (RouteRequirement::Guest, true) => {
            NavigationDecision::Redirect(Route::DEFAULT_AUTHENTICATED)
        }
        _ => NavigationDecision::Allow,
    }
}

/// Intercepts navigations and gates them on the session.
pub struct NavigationGuard<B: AuthApi + ?Sized> {
    session: Arc<SessionManager<B>>,
}

impl<B: AuthApi + ?Sized> NavigationGuard<B> {
    pub fn new(session: Arc<SessionManager<B>>) -> Self {
        Self { session }
    }

    /// Decides a navigation to `target`, suspending while the session loads.
    pub async fn check(&self, target: Route) -> NavigationDecision {
        let started_at = Instant::now();
        if self.session.is_loading() {
            debug!(
                "event=nav_guard module=navigation status=waiting target={}",
                target.name()
            );
        }
        let state = self.session.wait_until_ready().await;
        let decision = decide(target, state.is_authenticated());

        match decision {
            NavigationDecision::Allow => info!(
                "event=nav_guard module=navigation status=ok target={} decision=allow waited_ms={}",
                target.name(),
                started_at.elapsed().as_millis()
            ),
            NavigationDecision::Redirect(to) => info!(
                "event=nav_guard module=navigation status=ok target={} decision=redirect redirect_to={} waited_ms={}",
                target.name(),
                to.name(),
                started_at.elapsed().as_millis()
            ),
        }
        decision
    }

    /// Resolves `path` and decides the navigation.
    pub async fn navigate(&self, path: &str) -> Result<NavigationDecision, UnknownRoute> {
        let route = Route::from_path(path).ok_or_else(|| UnknownRoute(path.to_string()))?;
        Ok(self.check(route).await)
    }
}
