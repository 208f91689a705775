mod common;

use common::{register_signed_out, ScriptedBackend, EMAIL, PASSWORD, USERNAME};
use std::sync::Arc;
use std::time::Duration;
use tasklane_core::{
    AppContext, NavigationDecision, NavigationGuard, Route, SessionManager, UnknownRoute,
};

#[tokio::test]
async fn navigations_wait_for_session_initialization() {
    let (backend, gate) = ScriptedBackend::gated();
    let backend = Arc::new(backend);
    let session = Arc::new(SessionManager::new(Arc::clone(&backend)));
    let guard = Arc::new(NavigationGuard::new(Arc::clone(&session)));

    let paths = ["/tasks", "/auth", "/projects", "/"];
    let navigations = paths
        .into_iter()
        .map(|path| {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { guard.navigate(path).await })
        })
        .collect::<Vec<_>>();
    let init = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.initialize().await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.is_loading());
    for navigation in &navigations {
        assert!(!navigation.is_finished());
    }

    gate.notify_one();
    init.await.unwrap();

    let mut decisions = Vec::new();
    for navigation in navigations {
        decisions.push(navigation.await.unwrap().unwrap());
    }
    assert_eq!(
        decisions,
        [
            NavigationDecision::Redirect(Route::Auth),
            NavigationDecision::Allow,
            NavigationDecision::Redirect(Route::Auth),
            NavigationDecision::Redirect(Route::Auth),
        ]
    );
}

#[tokio::test]
async fn protected_route_redirects_guest_to_sign_in() {
    let context = AppContext::start(Arc::new(ScriptedBackend::new())).await;

    for path in ["/tasks", "/projects", "/profile", "/"] {
        assert_eq!(
            context.guard.navigate(path).await.unwrap(),
            NavigationDecision::Redirect(Route::SIGN_IN),
            "path {path}"
        );
    }
    assert_eq!(
        context.guard.check(Route::Auth).await,
        NavigationDecision::Allow
    );
}

#[tokio::test]
async fn auth_route_redirects_signed_in_user_to_tasks() {
    let context = AppContext::start(Arc::new(ScriptedBackend::new())).await;
    context
        .session
        .sign_up(EMAIL, PASSWORD, USERNAME)
        .await
        .unwrap();

    assert_eq!(
        context.guard.navigate("/auth").await.unwrap(),
        NavigationDecision::Redirect(Route::Tasks)
    );
    assert_eq!(
        context.guard.navigate("/tasks").await.unwrap(),
        NavigationDecision::Allow
    );
}

#[tokio::test]
async fn decisions_follow_sign_out() {
    let backend = Arc::new(ScriptedBackend::new());
    register_signed_out(backend.inner()).await;
    let context = AppContext::start(Arc::clone(&backend)).await;
    context.session.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(
        context.guard.check(Route::Projects).await,
        NavigationDecision::Allow
    );

    context.session.sign_out().await.unwrap();

    assert_eq!(
        context.guard.check(Route::Projects).await,
        NavigationDecision::Redirect(Route::Auth)
    );
}

#[tokio::test]
async fn unknown_path_is_an_error() {
    let context = AppContext::start(Arc::new(ScriptedBackend::new())).await;

    let err = context.guard.navigate("/settings").await.unwrap_err();

    assert_eq!(err, UnknownRoute("/settings".to_string()));
}

#[tokio::test]
async fn settled_session_decides_without_waiting() {
    let context = AppContext::start(Arc::new(ScriptedBackend::new())).await;

    let decision = tokio::time::timeout(Duration::from_secs(1), context.guard.check(Route::Tasks))
        .await
        .unwrap();

    assert_eq!(decision, NavigationDecision::Redirect(Route::Auth));
}
