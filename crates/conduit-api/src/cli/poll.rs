//! One-off poll cycle from the command line.
//!
//! Runs exactly one cycle against the remote listing API without starting
//! the scheduler. With `--dry-run` the cycle works on an in-memory copy of
//! the stored checkpoint, so nothing is persisted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use console::style;

use conduit_core::reconcile::emitter::{ChannelEmitter, EmittedEvent};
use conduit_core::reconcile::engine::{ReconcileEngine, ReconcileError};
use conduit_core::reconcile::poll::{PollReport, PollRunner};
use conduit_core::reconcile::schedule::PollParams;
use conduit_core::repository::checkpoint::CheckpointStore;
use conduit_infra::memory::InMemoryCheckpointStore;
use conduit_infra::scheduler::ManualScheduler;
use conduit_infra::sqlite::checkpoint::SqliteCheckpointStore;
use conduit_types::checkpoint::Checkpoint;
use conduit_types::config::EngineConfig;
use conduit_types::trigger::TriggerSpec;

use crate::http::handlers::trigger::CheckpointView;
use crate::state::{build_lister, open_database};

struct CycleOutcome {
    report: Result<PollReport, ReconcileError>,
    events: Vec<EmittedEvent>,
    checkpoint: Checkpoint,
    next_poll: Option<Duration>,
}

/// Run one poll cycle for `trigger_id` and print the outcome.
pub async fn poll(
    data_dir: &Path,
    config: EngineConfig,
    trigger_id: &str,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let Some(spec) = config.triggers.iter().find(|t| t.id == trigger_id).cloned() else {
        bail!("trigger '{trigger_id}' is not configured in config.toml");
    };

    let store = SqliteCheckpointStore::new(open_database(data_dir).await?);
    let outcome = if dry_run {
        let scratch = InMemoryCheckpointStore::new();
        if let Some(raw) = store.get(trigger_id).await? {
            scratch.set(trigger_id, &raw).await?;
        }
        run_cycle(scratch, config, spec).await?
    } else {
        run_cycle(store, config, spec).await?
    };

    print_outcome(trigger_id, &outcome, dry_run, json)?;

    match outcome.report {
        Ok(_) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn run_cycle<S: CheckpointStore>(
    store: S,
    config: EngineConfig,
    spec: TriggerSpec,
) -> Result<CycleOutcome> {
    // Room for every item a single cycle can fetch, so emission never blocks.
    let capacity = config.page_size as usize * config.max_pages as usize + 1;
    let (emitter, mut rx) = ChannelEmitter::new(capacity);
    let lister = build_lister(&config)?;

    let trigger_id = spec.id.clone();
    let engine = Arc::new(ReconcileEngine::new(store, emitter, config));
    engine.register(spec);

    let scheduler = Arc::new(ManualScheduler::new());
    let runner = PollRunner::new(Arc::clone(&engine), lister, Arc::clone(&scheduler));

    let report = runner.run(&PollParams::new(&trigger_id)).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let checkpoint = engine.load_checkpoint(&trigger_id).await?;

    Ok(CycleOutcome {
        report,
        events,
        checkpoint,
        next_poll: scheduler.next_requested().map(|(_, delay)| delay),
    })
}

fn print_outcome(trigger_id: &str, outcome: &CycleOutcome, dry_run: bool, json: bool) -> Result<()> {
    let checkpoint = CheckpointView::new(trigger_id, &outcome.checkpoint);

    if json {
        let report = match &outcome.report {
            Ok(r) => serde_json::json!({
                "fetched": r.fetched,
                "collected": r.collected,
                "emitted": r.emitted,
                "suppressed": r.suppressed,
                "deferred": r.deferred,
                "filter_disabled": r.filter_disabled,
            }),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        let out = serde_json::json!({
            "trigger_id": trigger_id,
            "dry_run": dry_run,
            "report": report,
            "events": outcome.events.iter().map(|e| &e.payload).collect::<Vec<_>>(),
            "checkpoint": checkpoint,
            "next_poll_secs": outcome.next_poll.map(|d| d.as_secs()),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Poll cycle for '{}'{}",
        style("⟳").bold(),
        style(trigger_id).cyan(),
        if dry_run {
            style(" (dry run)").yellow().to_string()
        } else {
            String::new()
        }
    );
    println!();

    match &outcome.report {
        Ok(r) => {
            println!("  Fetched:    {}", r.fetched);
            println!("  Unseen:     {}", r.collected);
            println!("  Emitted:    {}", style(r.emitted).green());
            println!("  Suppressed: {}", r.suppressed);
            if let Some(id) = &r.deferred {
                println!(
                    "  Deferred:   {} {}",
                    style(id).yellow(),
                    style("(inside race window)").dim()
                );
            }
            if r.filter_disabled {
                println!("  {}", style("Server-side pipeline filter disabled").dim());
            }
        }
        Err(e) => println!("  {} {e}", style("✗").red()),
    }

    if !outcome.events.is_empty() {
        println!();
        println!("  {}", style("── Emitted ──").dim());
        for event in &outcome.events {
            println!(
                "  {} {} {}",
                style("→").green(),
                event.payload["execution_id"].as_str().unwrap_or("?"),
                style(event.payload["status"].as_str().unwrap_or("")).dim()
            );
        }
    }

    println!();
    println!("  {}", style("── Checkpoint ──").dim());
    println!(
        "  Last execution: {}",
        if checkpoint.last_execution_id.is_empty() {
            style("(none)".to_string()).dim()
        } else {
            style(checkpoint.last_execution_id.clone()).bold()
        }
    );
    if let Some(iso) = &checkpoint.last_execution_ended_at_iso {
        println!("  Ended at:       {iso}");
    }
    if checkpoint.poll_error_count > 0 {
        println!(
            "  Poll errors:    {}",
            style(checkpoint.poll_error_count).red()
        );
    }
    if let Some(delay) = outcome.next_poll {
        println!(
            "  {}",
            style(format!("Next poll would run in {}s", delay.as_secs())).dim()
        );
    }
    println!();
    Ok(())
}
