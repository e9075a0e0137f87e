// src/run/coordinator.rs
// =============================================================================
// Orchestrates one full check run for a dataset.
//
// How it works:
// 1. Take the single-flight permit (or fail with AlreadyRunning)
// 2. fetching: download the catalog (bounded retries)
//    - nothing usable -> complete, keep the previous snapshot untouched
// 3. Normalize the catalog into LinkRecords
// 4. Load the previous snapshot (for "first broken" continuity)
// 5. checking: probe every record, up to `workers` at a time, one progress
//    event per finished record with current = 1, 2, 3, ...
// 6. Merge, persist the snapshot and the CSV export
// 7. complete: final event, permit released
//
// Every run that got past step 1 ends with exactly one `complete` event,
// including runs that fail, so progress subscribers always terminate.
// =============================================================================

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::guard::{RunGuard, RunPermit};
use crate::catalog::{self, CatalogSource, RetryPolicy};
use crate::checker::{LinkStatus, Prober};
use crate::error::RunError;
use crate::history::{self, SnapshotStore};
use crate::model::{self, Dataset, HistorySnapshot, LinkRecord};
use crate::progress::{ProgressChannel, ProgressEvent, RunState};

// Who asked for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The periodic scheduler; stamps last_auto_refresh
    Scheduled,
    /// A person (HTTP refresh or CLI)
    Manual,
}

pub struct Coordinator {
    catalog: Arc<dyn CatalogSource>,
    prober: Arc<dyn Prober>,
    store: SnapshotStore,
    progress: ProgressChannel,
    guard: RunGuard,
    retry: RetryPolicy,
    workers: usize,
}

impl Coordinator {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        prober: Arc<dyn Prober>,
        store: SnapshotStore,
        progress: ProgressChannel,
    ) -> Self {
        Self {
            catalog,
            prober,
            store,
            progress,
            guard: RunGuard::new(),
            retry: RetryPolicy::default(),
            workers: 1,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // 1 = sequential, N = at most N probes in flight
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn progress(&self) -> &ProgressChannel {
        &self.progress
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    // Runs a check to completion on the current task
    pub async fn run(&self, dataset: Dataset, trigger: Trigger) -> Result<HistorySnapshot, RunError> {
        let permit = self.guard.try_acquire().ok_or(RunError::AlreadyRunning)?;
        self.run_with_permit(permit, dataset, trigger).await
    }

    // Takes the permit now and runs in the background. The rejection is
    // synchronous so callers can answer "already running" immediately.
    pub fn spawn_run(
        self: &Arc<Self>,
        dataset: Dataset,
        trigger: Trigger,
    ) -> Result<JoinHandle<Result<HistorySnapshot, RunError>>, RunError> {
        let permit = self.guard.try_acquire().ok_or(RunError::AlreadyRunning)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            this.run_with_permit(permit, dataset, trigger).await
        }))
    }

    async fn run_with_permit(
        &self,
        permit: RunPermit,
        dataset: Dataset,
        trigger: Trigger,
    ) -> Result<HistorySnapshot, RunError> {
        log::info!("[{}] Check started ({:?})", dataset, trigger);
        self.emit(dataset, RunState::Starting, format!("[{}] Warming up...", dataset), 0, 0);

        let result = self.execute(dataset, trigger).await;

        match &result {
            Ok(snapshot) => log::info!(
                "[{}] Check finished: {} results",
                dataset,
                snapshot.results.len()
            ),
            Err(e) => {
                log::error!("[{}] Check failed: {}", dataset, e);
                self.emit(dataset, RunState::Complete, format!("[{}] Check failed: {}", dataset, e), 0, 0);
            }
        }

        permit.release();
        result
    }

    async fn execute(&self, dataset: Dataset, trigger: Trigger) -> Result<HistorySnapshot, RunError> {
        self.emit(dataset, RunState::Fetching, format!("[{}] Fetching catalog...", dataset), 0, 0);

        let items = match catalog::fetch_with_retry(self.catalog.as_ref(), dataset, self.retry).await {
            Ok(items) => items,
            Err(e) => {
                log::warn!("[{}] Giving up on catalog: {}", dataset, e);
                Vec::new()
            }
        };
        let records = catalog::normalize(dataset, &items);

        if records.is_empty() {
            // Never replace good history with an empty fetch. Load first: a
            // corrupt snapshot must fail the run before any `complete` goes out.
            let previous = self.store.load(dataset)?;
            self.emit(dataset, RunState::Complete, format!("No records found for {}", dataset), 0, 0);
            return Ok(previous);
        }

        let previous = self.store.load(dataset)?;
        let run_at = model::now();

        let probed = self.probe_all(dataset, records).await;
        let snapshot = history::merge(probed, &previous, run_at, trigger == Trigger::Scheduled);

        // Persistence problems are reported but do not fail the run
        if let Err(e) = self.store.save(dataset, &snapshot) {
            log::error!("[{}] Could not save snapshot: {}", dataset, e);
        }
        if let Err(e) = self.store.write_export(dataset, &snapshot.results) {
            log::error!("[{}] Could not write CSV export: {}", dataset, e);
        }

        self.emit(dataset, RunState::Complete, format!("[{}] Check completed", dataset), 0, 0);
        Ok(snapshot)
    }

    // Probes every record; results come back in catalog order
    async fn probe_all(&self, dataset: Dataset, records: Vec<LinkRecord>) -> Vec<(LinkRecord, LinkStatus)> {
        let total = records.len();
        let mut statuses: Vec<Option<LinkStatus>> = vec![None; total];

        // Each future owns its record so the run future stays Send for tokio::spawn
        let mut outcomes = stream::iter(records.iter().cloned().enumerate())
            .map(|(index, record)| {
                let prober = Arc::clone(&self.prober);
                async move { (index, prober.probe(&record).await) }
            })
            .buffer_unordered(self.workers);

        let mut done = 0;
        while let Some((index, outcome)) = outcomes.next().await {
            done += 1;
            self.emit(
                dataset,
                RunState::Checking,
                format!("Checking {}", records[index].label()),
                done,
                total,
            );
            statuses[index] = Some(outcome.status);
        }
        drop(outcomes);

        records
            .into_iter()
            .zip(statuses)
            .map(|(record, status)| (record, status.unwrap_or(LinkStatus::Broken)))
            .collect()
    }

    fn emit(&self, dataset: Dataset, state: RunState, message: String, current: usize, total: usize) {
        self.progress.publish(ProgressEvent {
            state,
            message,
            current,
            total,
            dataset: Some(dataset),
        });
    }
}
