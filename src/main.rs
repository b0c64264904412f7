use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pr_triggers::config::Config;
use pr_triggers::dispatch::{DispatchConfig, EventDispatcher};
use pr_triggers::github::{Credentials, GitHubCollaboratorAuthority};
use pr_triggers::scheduler::QueueScheduler;
use pr_triggers::scheduler::executor::BuildExecutor;
use pr_triggers::server::{AppState, build_router};
use pr_triggers::triggers::Registries;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pr_triggers=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("reading configuration")?;

    let mut credentials = Credentials::new();
    if let Some(token) = &config.github_token {
        credentials = credentials.with_default_token(token);
    }
    if config.webhook_secret.is_none() {
        tracing::warn!("No webhook secret configured; signatures will not be checked");
    }

    let shutdown = CancellationToken::new();
    let (scheduler, queue) = QueueScheduler::channel();
    let executor = tokio::spawn(BuildExecutor::new(queue, shutdown.clone()).run());

    let dispatcher = EventDispatcher::new(
        Arc::new(Registries::new()),
        GitHubCollaboratorAuthority::new(credentials),
        scheduler,
        DispatchConfig::default().with_quiet_period(config.quiet_period),
    );
    let app = build_router(AppState::new(dispatcher, config.webhook_secret));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("listening on {}", config.bind_addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Shutting down");
            signal.cancel();
        })
        .await
        .context("serving HTTP")?;

    shutdown.cancel();
    let counts = executor.await.context("build executor panicked")?;
    tracing::info!(
        builds = counts.total(),
        succeeded = counts.succeeded,
        failed = counts.failed,
        "Build executor stopped"
    );
    Ok(())
}
