//! `run` and `monitor` commands.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::style;
use tokio::sync::watch;

use super::helpers;
use crate::config::Settings;
use crate::pipeline::{load_batches, Orchestrator, PriorityList, RunReport, WorkerCounts};
use crate::storage::load_inventory;

/// Spawn a task that flips the stop signal once `signal` resolves.
///
/// If the signal cannot be installed the sender is kept alive, so receivers
/// never observe a closed channel as a stop request.
fn stop_on<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                eprintln!(
                    "{} Interrupt received, finishing in-flight accessions...",
                    style("!").yellow()
                );
                let _ = tx.send(true);
            }
            Err(e) => {
                tracing::warn!("Ctrl-C handler unavailable: {}", e);
                std::future::pending::<()>().await;
                drop(tx);
            }
        }
    });
    rx
}

fn stop_on_ctrl_c() -> watch::Receiver<bool> {
    stop_on(tokio::signal::ctrl_c())
}

async fn run_once(settings: &Settings, stop: watch::Receiver<bool>) -> anyhow::Result<RunReport> {
    let processor = helpers::processor(settings)?;

    let inventory = load_inventory(
        processor.store().as_ref(),
        &settings.inventory_csv,
        settings.refresh_inventory,
    )
    .await
    .context("loading inventory")?;

    let batches = load_batches(&settings.batches_dir)
        .with_context(|| format!("reading batches from {}", settings.batches_dir.display()))?;

    let priority = match settings.priority_file {
        Some(ref path) => PriorityList::load(path).context("loading priority list")?,
        None => PriorityList::default(),
    };

    let orchestrator = Orchestrator::new(
        Arc::new(processor),
        Arc::new(inventory),
        WorkerCounts {
            file_workers: settings.file_workers,
            record_workers: settings.record_workers,
        },
    )
    .with_log_path(&settings.log_csv)
    .with_stop_signal(stop);

    Ok(orchestrator.run(batches, &priority).await)
}

fn print_report(report: &RunReport) {
    println!(
        "{} Run {} finished ({} attempts)",
        style("✓").green(),
        style(&report.run_id).dim(),
        report.entries.len()
    );
    println!("{}", report.summary);
}

pub async fn cmd_run(settings: &Settings) -> anyhow::Result<()> {
    let stop = stop_on_ctrl_c();
    let report = run_once(settings, stop).await?;
    print_report(&report);
    println!("Run log: {}", settings.log_csv.display());
    Ok(())
}

pub async fn cmd_monitor(settings: &Settings, interval: u64) -> anyhow::Result<()> {
    let mut stop = stop_on_ctrl_c();
    println!(
        "{} Monitoring (interval: {}s), Ctrl-C to stop",
        style("→").cyan(),
        interval
    );

    loop {
        let report = run_once(settings, stop.clone()).await?;
        print_report(&report);

        if *stop.borrow() {
            break;
        }

        println!(
            "{} Sleeping for {}s before next run...",
            style("→").dim(),
            interval
        );
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = stop.changed() => break,
        }
    }

    println!("{} Monitor stopped", style("✓").green());
    Ok(())
}
