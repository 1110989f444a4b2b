//! Conduit CLI and REST API entry point.
//!
//! Binary name: `conduit`
//!
//! Parses CLI arguments, initializes tracing, the database and services, then
//! dispatches to the command handler or starts the webhook server.

mod cli;
mod http;
mod state;

use std::sync::Arc;

use clap::Parser;
use clap_complete::generate;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use conduit_core::reconcile::emitter::EmittedEvent;
use conduit_core::reconcile::schedule::PollParams;
use conduit_infra::config::{load_engine_config, resolve_data_dir};
use conduit_infra::scheduler::PollCallback;
use conduit_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "conduit", &mut std::io::stdout());
        return Ok(());
    }

    let otel = matches!(cli.command, Commands::Serve { otel: true, .. });
    init_tracing(cli.log_filter(), otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, host, .. } => {
            let (state, events) = AppState::init().await?;
            serve(state, events, &host, port).await?;
        }

        Commands::Poll {
            trigger_id,
            dry_run,
        } => {
            let data_dir = resolve_data_dir();
            tokio::fs::create_dir_all(&data_dir).await?;
            let config = load_engine_config(&data_dir).await;
            cli::poll::poll(&data_dir, config, &trigger_id, dry_run, cli.json).await?;
        }

        Commands::Checkpoint { trigger_id } => {
            let (state, _events) = AppState::init().await?;
            cli::checkpoint::show_checkpoint(&state, &trigger_id, cli.json).await?;
        }

        Commands::Triggers => {
            let (state, _events) = AppState::init().await?;
            cli::checkpoint::list_triggers(&state, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled in main"),
    }

    Ok(())
}

async fn serve(
    state: AppState,
    events: mpsc::Receiver<EmittedEvent>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    // Weak: the runner owns an Arc of the scheduler that owns this callback.
    let runner = Arc::downgrade(&state.runner);
    let callback: PollCallback = Arc::new(move |params: PollParams| {
        let runner = runner.clone();
        async move {
            let Some(runner) = runner.upgrade() else {
                return;
            };
            if let Err(e) = runner.run(&params).await {
                tracing::debug!(trigger_id = %params.trigger_id, error = %e, "poll cycle failed");
            }
        }
        .boxed()
    });
    state.scheduler.set_callback(callback);
    state.scheduler.start().await?;

    for spec in state.config.triggers.clone() {
        let trigger_id = spec.id.clone();
        match state.triggers.setup(spec).await {
            Ok(()) => tracing::info!(%trigger_id, "trigger ready"),
            Err(e) => tracing::error!(%trigger_id, error = %e, "trigger setup failed"),
        }
    }

    let cancel = CancellationToken::new();
    let consumer = tokio::spawn(consume_events(events, cancel.clone()));

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Conduit listening on {} ({} triggers)",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan(),
        state.triggers.list().len()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let scheduler = Arc::clone(&state.scheduler);
    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await?;
    cancel.cancel();
    let _ = consumer.await;

    println!("\n  Server stopped.");
    Ok(())
}

/// Drain emitted completion events until cancelled.
async fn consume_events(mut events: mpsc::Receiver<EmittedEvent>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                tracing::info!(
                    event_type = %event.event_type,
                    trigger_id = event.payload["trigger_id"].as_str().unwrap_or_default(),
                    execution_id = event.payload["execution_id"].as_str().unwrap_or_default(),
                    status = event.payload["status"].as_str().unwrap_or_default(),
                    source = event.payload["source"].as_str().unwrap_or_default(),
                    "completion event"
                );
            }
        }
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
