//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `tasklane_core` linkage and configuration from the environment.
//! - Drive the session/sync layer end-to-end against the configured backend.
//!
//! Usage:
//! - `tasklane` prints version, config status and the landing decision.
//! - `tasklane demo <email> <password> <username>` signs up, creates a project
//!   and a task, toggles it, and prints the synchronized collections.

use log::error;
use std::process::ExitCode;
use std::sync::Arc;
use tasklane_core::{
    init_logging, AppConfig, AppContext, Endpoint, LocalBackend, NavigationDecision, Priority,
    SyncResult,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    println!("tasklane_core ping={}", tasklane_core::ping());
    println!("tasklane_core version={}", tasklane_core::core_version());

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(2);
        }
    };
    if let Some(logging) = &config.logging {
        if let Err(err) = init_logging(logging) {
            eprintln!("logging disabled: {err}");
        }
    }

    let backend = match open_backend(&config) {
        Ok(backend) => Arc::new(backend),
        Err(message) => {
            error!("event=cli_start module=cli status=error error={message}");
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let context = AppContext::start(backend).await;
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let outcome = match args.as_slice() {
        [] => {
            print_landing(&context).await;
            Ok(())
        }
        [command, email, password, username] if command == "demo" => {
            run_demo(&context, email, password, username).await
        }
        _ => {
            eprintln!("usage: tasklane [demo <email> <password> <username>]");
            context.shutdown();
            return ExitCode::from(2);
        }
    };
    context.shutdown();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn open_backend(config: &AppConfig) -> Result<LocalBackend, String> {
    let endpoint = config.backend.endpoint().map_err(|err| err.to_string())?;
    let opened = match &endpoint {
        Endpoint::SqliteMemory => LocalBackend::open_in_memory(),
        Endpoint::SqliteFile(path) => LocalBackend::open(path),
    };
    opened.map_err(|err| format!("failed to open backend: {err}"))
}

async fn print_landing(context: &AppContext<LocalBackend>) {
    match context.guard.navigate("/").await {
        Ok(NavigationDecision::Allow) => println!("landing=/tasks"),
        Ok(NavigationDecision::Redirect(route)) => println!("landing={route}"),
        Err(err) => println!("landing_error={err}"),
    }
}

async fn run_demo(
    context: &AppContext<LocalBackend>,
    email: &str,
    password: &str,
    username: &str,
) -> SyncResult<()> {
    context.session.sign_up(email, password, username).await?;

    let project = context
        .projects
        .create_project("Inbox", None, None)
        .await?;
    let task = context
        .tasks
        .create_task(
            "Try tasklane",
            Some("created by the CLI demo".to_string()),
            Some(Priority::High),
            Some(project.id),
            None,
        )
        .await?;
    context.tasks.toggle(task.id).await?;

    context.projects.fetch().await;
    context.tasks.fetch().await;

    for project in context.projects.items() {
        println!("project id={} name={} color={}", project.id, project.name, project.color);
    }
    for task in context.tasks.items() {
        println!(
            "task id={} title={} completed={} priority={} project={}",
            task.id,
            task.title,
            task.completed,
            task.priority.as_str(),
            task.project.as_ref().map_or("-", |project| project.name.as_str())
        );
    }

    context.session.sign_out().await?;
    print_landing(context).await;
    Ok(())
}
