use std::sync::Arc;

use anyhow::Context;

use puretask_onboarding::config::{ClientConfig, ServerConfig};
use puretask_onboarding::onboarding::cleaner::cleaner_registry;
use puretask_onboarding::onboarding::{
    HttpProgressStore, MemoryProgressStore, OnboardingRouteState, ProgressStore, WizardEngine,
    WizardEvent, onboarding_routes, spawn_progress_poller,
};

const USAGE: &str = "usage: puretask-onboard <serve|status|watch>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let command = std::env::args().nth(1).unwrap_or_default();
    match command.as_str() {
        "serve" => serve().await,
        "status" => status().await,
        "watch" => watch().await,
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

/// Run the in-memory dev backend.
async fn serve() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let registry = cleaner_registry();
    let store = Arc::new(
        MemoryProgressStore::new(registry).with_redirect(config.completion_redirect.clone()),
    );
    let app = onboarding_routes(OnboardingRouteState { store });

    eprintln!("PureTask onboarding dev backend v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/cleaner/onboarding", config.port);
    eprintln!("   Completion redirect: {}\n", config.completion_redirect);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    tracing::info!(port = config.port, "Dev backend started");
    axum::serve(listener, app).await?;
    Ok(())
}

fn connect() -> puretask_onboarding::error::Result<(ClientConfig, Arc<WizardEngine>)> {
    let config = ClientConfig::from_env()?;
    let store: Arc<dyn ProgressStore> = Arc::new(HttpProgressStore::new(&config)?);
    let engine = Arc::new(WizardEngine::cleaner(store)?);
    Ok((config, engine))
}

/// Print the resolved resume step and per-step completion.
async fn status() -> anyhow::Result<()> {
    let (_config, engine) = connect()?;
    let current = engine
        .initialize()
        .await
        .context("fetching onboarding progress")?;
    let record = engine.snapshot().await.unwrap_or_default();

    if let Some(summary) = engine.progress_summary().await {
        println!(
            "Progress: {}/{} steps ({}%)",
            summary.completed, summary.total, summary.percent_complete
        );
    }
    for step in engine.registry().steps() {
        let mark = if record.is_step_completed(&step.id) { "x" } else { " " };
        let pointer = if step.index == current.index { "  <- resume here" } else { "" };
        println!("  [{mark}] {:>2}. {}{pointer}", step.index + 1, step.id);
    }
    Ok(())
}

/// Poll progress and print events until interrupted or every step is done.
async fn watch() -> anyhow::Result<()> {
    let (config, engine) = connect()?;
    let mut rx = engine.subscribe();
    let poller = spawn_progress_poller(Arc::clone(&engine), config.poll_interval);
    eprintln!(
        "Watching onboarding progress every {:?}. Ctrl-C to stop.",
        config.poll_interval
    );

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(WizardEvent::StepChanged { step, index }) => {
                    println!("step: {step} (#{})", index + 1);
                }
                Ok(WizardEvent::ProgressRefreshed { summary }) => {
                    println!("progress: {}%", summary.percent_complete);
                    if summary.completed == summary.total {
                        println!("onboarding finished");
                        break;
                    }
                }
                // Not sent here: `watch` never calls `complete_wizard`.
                Ok(WizardEvent::Completed { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "Event stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.abort();
    engine.flush_persistence().await;
    Ok(())
}
