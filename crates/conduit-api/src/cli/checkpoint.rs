//! Checkpoint inspection and trigger listing commands.

use anyhow::{Result, bail};
use console::style;

use crate::http::handlers::trigger::{CheckpointView, TriggerView};
use crate::state::AppState;

/// Print the stored checkpoint for one configured trigger.
pub async fn show_checkpoint(state: &AppState, trigger_id: &str, json: bool) -> Result<()> {
    if !state.config.triggers.iter().any(|t| t.id == trigger_id) {
        bail!("trigger '{trigger_id}' is not configured in config.toml");
    }

    let stored = state.engine.stored_checkpoint(trigger_id).await?;
    let view = stored.map(|cp| CheckpointView::new(trigger_id, &cp));

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!();
    let Some(view) = view else {
        println!(
            "  {} No checkpoint stored for '{}' yet",
            style("○").dim(),
            style(trigger_id).cyan()
        );
        println!();
        return Ok(());
    };

    println!("  Checkpoint for '{}'", style(trigger_id).cyan().bold());
    println!();
    println!(
        "  Last execution:  {}",
        if view.last_execution_id.is_empty() {
            "(none)".to_string()
        } else {
            view.last_execution_id.clone()
        }
    );
    println!(
        "  Watermark:       {}{}",
        view.last_execution_ended_at,
        view.last_execution_ended_at_iso
            .as_deref()
            .map(|iso| format!(" ({iso})"))
            .unwrap_or_default()
    );
    println!(
        "  Timestampless:   {}",
        if view.timestampless_execution_ids.is_empty() {
            "-".to_string()
        } else {
            view.timestampless_execution_ids.join(", ")
        }
    );
    let errors = if view.poll_error_count > 0 {
        style(view.poll_error_count).red()
    } else {
        style(view.poll_error_count).green()
    };
    println!("  Poll errors:     {errors}");
    println!(
        "  Server filter:   {}",
        if view.server_filter_disabled {
            style("disabled").yellow()
        } else {
            style("enabled").green()
        }
    );
    println!();
    Ok(())
}

/// List configured triggers with their current watermark.
pub async fn list_triggers(state: &AppState, json: bool) -> Result<()> {
    let mut rows = Vec::with_capacity(state.config.triggers.len());
    for spec in &state.config.triggers {
        let checkpoint = state.engine.stored_checkpoint(&spec.id).await?;
        rows.push((TriggerView::from(spec.clone()), checkpoint));
    }

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|(trigger, checkpoint)| {
                serde_json::json!({
                    "trigger": trigger,
                    "checkpoint": checkpoint
                        .as_ref()
                        .map(|cp| CheckpointView::new(&trigger.id, cp)),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    if rows.is_empty() {
        println!(
            "  {} No triggers configured in {}",
            style("○").dim(),
            state.data_dir.join("config.toml").display()
        );
        println!();
        return Ok(());
    }

    for (trigger, checkpoint) in &rows {
        let pipeline = trigger.pipeline_identifier.as_deref().unwrap_or("*");
        let watermark = match checkpoint {
            Some(cp) if !cp.last_execution_id.is_empty() => {
                format!("{} @ {}", cp.last_execution_id, cp.last_execution_ended_at)
            }
            Some(_) => "no executions yet".to_string(),
            None => "not set up".to_string(),
        };
        println!(
            "  {} {} {}/{}/{}  {}",
            if trigger.prefers_webhook {
                style("⚡").yellow()
            } else {
                style("⟳").dim()
            },
            style(&trigger.id).cyan().bold(),
            trigger.organization,
            trigger.project,
            pipeline,
            style(watermark).dim()
        );
    }
    println!();
    Ok(())
}
