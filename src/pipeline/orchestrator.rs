//! Parallel orchestrator.
//!
//! Planned work units sit in one shared queue. `file_workers` tasks pop
//! units; each unit's accessions run with up to `record_workers` in flight.
//! Outcomes go over a channel to a single run-log writer task, so workers
//! never wait on log I/O.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::batches::{plan_work, AccessionBatch, PriorityList, WorkUnit};
use super::gate::should_process;
use super::processor::AccessionProcessor;
use super::run_log::{RunLogWriter, RunSummary};
use crate::models::{Accession, AccessionId, AttemptContext, RunLogEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerCounts {
    pub file_workers: usize,
    pub record_workers: usize,
}

impl Default for WorkerCounts {
    fn default() -> Self {
        Self {
            file_workers: 4,
            record_workers: 1,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    /// One entry per attempt, in completion order.
    pub entries: Vec<RunLogEntry>,
    pub summary: RunSummary,
    /// Accessions in the order their units were assigned to workers.
    pub dispatch_order: Vec<AccessionId>,
}

pub struct Orchestrator {
    processor: Arc<AccessionProcessor>,
    inventory: Arc<HashSet<AccessionId>>,
    workers: WorkerCounts,
    log_path: Option<PathBuf>,
    stop: Option<watch::Receiver<bool>>,
}

struct Shared {
    queue: Mutex<VecDeque<WorkUnit>>,
    dispatched: Mutex<Vec<AccessionId>>,
    /// Accessions of already-assigned units skipped after a stop.
    cancelled: AtomicUsize,
    processor: Arc<AccessionProcessor>,
    log: mpsc::UnboundedSender<RunLogEntry>,
    stop: Option<watch::Receiver<bool>>,
    run_id: String,
    record_workers: usize,
}

impl Shared {
    fn stopped(&self) -> bool {
        self.stop.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Pop the next unit and record its accessions as assigned.
    fn next_unit(&self) -> Option<WorkUnit> {
        if self.stopped() {
            return None;
        }
        let mut queue = self.queue.lock().ok()?;
        let unit = queue.pop_front()?;
        if let Ok(mut dispatched) = self.dispatched.lock() {
            dispatched.extend(unit.accessions.iter().map(|a| a.id.clone()));
        }
        Some(unit)
    }

    fn not_dispatched(&self) -> usize {
        let queued: usize = self
            .queue
            .lock()
            .map(|q| q.iter().map(|u| u.accessions.len()).sum())
            .unwrap_or(0);
        queued + self.cancelled.load(Ordering::SeqCst)
    }
}

impl Orchestrator {
    pub fn new(
        processor: Arc<AccessionProcessor>,
        inventory: Arc<HashSet<AccessionId>>,
        workers: WorkerCounts,
    ) -> Self {
        Self {
            processor,
            inventory,
            workers: WorkerCounts {
                file_workers: workers.file_workers.max(1),
                record_workers: workers.record_workers.max(1),
            },
            log_path: None,
            stop: None,
        }
    }

    /// Append run log rows to this CSV file as they arrive.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Stop dispatching new accessions once the signal reads `true`.
    /// In-flight accessions run to completion.
    pub fn with_stop_signal(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub async fn run(&self, batches: Vec<AccessionBatch>, priority: &PriorityList) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();

        let total: usize = batches.iter().map(|b| b.len()).sum();
        let mut skipped_by_dedup = 0;
        let batches: Vec<AccessionBatch> = batches
            .into_iter()
            .map(|mut batch| {
                batch.accessions.retain(|acc| {
                    let keep = should_process(acc, &self.inventory);
                    if !keep {
                        skipped_by_dedup += 1;
                    }
                    keep
                });
                batch
            })
            .filter(|b| !b.is_empty())
            .collect();

        let queue = plan_work(batches, priority);
        info!(
            run_id = %run_id,
            "{} accessions, {} already persisted, {} work units, {} file workers x {} record workers",
            total,
            skipped_by_dedup,
            queue.len(),
            self.workers.file_workers,
            self.workers.record_workers
        );

        let (log_tx, log_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(collect_log(log_rx, self.log_path.clone()));

        let shared = Arc::new(Shared {
            queue: Mutex::new(queue),
            dispatched: Mutex::new(Vec::new()),
            cancelled: AtomicUsize::new(0),
            processor: Arc::clone(&self.processor),
            log: log_tx,
            stop: self.stop.clone(),
            run_id: run_id.clone(),
            record_workers: self.workers.record_workers,
        });

        let handles: Vec<_> = (0..self.workers.file_workers)
            .map(|n| tokio::spawn(file_worker(n, Arc::clone(&shared))))
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("file worker panicked: {}", e);
            }
        }

        let not_dispatched = shared.not_dispatched();
        let dispatch_order = shared
            .dispatched
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default();
        // Closing the last sender ends the writer task.
        drop(shared);

        let entries = match writer.await {
            Ok(entries) => entries,
            Err(e) => {
                error!("run log writer failed: {}", e);
                Vec::new()
            }
        };

        let mut summary = RunSummary::from_entries(&entries);
        summary.skipped_by_dedup = skipped_by_dedup;
        summary.not_dispatched = not_dispatched;
        if not_dispatched > 0 {
            warn!("run stopped with {} accessions not dispatched", not_dispatched);
        }

        RunReport {
            run_id,
            entries,
            summary,
            dispatch_order,
        }
    }
}

async fn file_worker(n: usize, shared: Arc<Shared>) {
    while let Some(unit) = shared.next_unit() {
        debug!(
            "f{}: batch {} ({} accessions)",
            n,
            unit.batch,
            unit.accessions.len()
        );
        let batch = unit.batch;
        let shared = &shared;
        let batch = batch.as_str();

        stream::iter(unit.accessions.into_iter().enumerate())
            .map(|(i, acc)| async move {
                if shared.stopped() {
                    shared.cancelled.fetch_add(1, Ordering::SeqCst);
                    return;
                }
                let worker = format!("f{}.r{}", n, i % shared.record_workers);
                process_one(shared, acc, batch, worker).await;
            })
            .buffer_unordered(shared.record_workers)
            .collect::<Vec<()>>()
            .await;
    }
}

async fn process_one(shared: &Shared, accession: Accession, batch: &str, worker: String) {
    let started_at = Utc::now();
    let start = Instant::now();
    let outcome = shared.processor.process(&accession).await;

    let entry = RunLogEntry::from_outcome(
        &outcome,
        AttemptContext {
            run_id: shared.run_id.clone(),
            cik: accession.cik.clone(),
            batch: batch.to_string(),
            worker,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        },
    );
    if shared.log.send(entry).is_err() {
        error!("run log closed; dropped entry for {}", accession.id);
    }
}

/// Single writer: owns the accumulated entries and the CSV file.
async fn collect_log(
    mut rx: mpsc::UnboundedReceiver<RunLogEntry>,
    path: Option<PathBuf>,
) -> Vec<RunLogEntry> {
    let mut writer = match path.as_deref().map(RunLogWriter::open).transpose() {
        Ok(writer) => writer,
        Err(e) => {
            error!("cannot open run log: {}", e);
            None
        }
    };

    let mut entries = Vec::new();
    while let Some(entry) = rx.recv().await {
        if let Some(ref mut w) = writer {
            if let Err(e) = w.append(&entry) {
                error!("failed to append run log row: {}", e);
            }
        }
        entries.push(entry);
    }
    entries
}
