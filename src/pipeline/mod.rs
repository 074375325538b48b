//! The extraction pipeline: dedup gate, per-accession processor, and the
//! parallel orchestrator that drives them over batches of accessions.

mod batches;
mod gate;
mod orchestrator;
mod processor;
mod retry;
mod run_log;

pub use batches::{
    load_batches, plan_work, read_batch, write_batch, AccessionBatch, BatchError, PriorityList,
    WorkUnit,
};
pub use gate::should_process;
pub use orchestrator::{Orchestrator, RunReport, WorkerCounts};
pub use processor::{AccessionProcessor, DEFAULT_PERSIST_ATTEMPTS, DEFAULT_PERSIST_BACKOFF_MS};
pub use retry::retry_with_backoff;
pub use run_log::{read_run_log, RunLogWriter, RunSummary};
