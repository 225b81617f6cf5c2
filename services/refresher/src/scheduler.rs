//! Refresh scheduler with per-source fault isolation.
//!
//! Each source walks the same tick: probe the latest issuance, short-circuit
//! if it is not newer than the cursor, otherwise retrieve, merge, normalize
//! and publish. Every failure is caught at this boundary and folded into a
//! `TickOutcome`; the previously published dataset always stays in the
//! store. A persistently failing source means a stale entry, never a dead
//! process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use forecast_common::{epoch_sentinel, RefreshError, SourceId};
use forecast_store::ForecastStore;
use normalizer::{merge_fragments, normalize};
use serde::Serialize;
use source_adapters::SourceAdapter;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Result of one refresh attempt for one source.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// A new dataset was normalized and published.
    Published { reference_time: DateTime<Utc> },
    /// Probed issuance was not newer than the cursor; nothing was fetched.
    UpToDate,
    /// Dataset retrieved but structurally incomplete upstream; retained
    /// the previous entry and will retry on the next tick.
    NotReady { missing: String },
    /// A refresh for this source was already running.
    InProgress,
    /// Probe, retrieval, merge or normalization failed.
    Failed { kind: String, message: String },
}

impl TickOutcome {
    fn failed(err: RefreshError) -> Self {
        Self::Failed {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Per-source status for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source: String,
    /// Issuance of the newest dataset published so far.
    pub cursor: DateTime<Utc>,
    pub last_tick: Option<DateTime<Utc>>,
    pub last_outcome: Option<TickOutcome>,
    pub published: u64,
    pub up_to_date: u64,
    pub not_ready: u64,
    pub failed: u64,
}

struct SourceSlot {
    adapter: Arc<dyn SourceAdapter>,
    /// Freshness cursor; non-decreasing.
    cursor: Mutex<DateTime<Utc>>,
    in_progress: AtomicBool,
    status: Mutex<SourceStatus>,
}

impl SourceSlot {
    fn new(adapter: Arc<dyn SourceAdapter>) -> Self {
        let status = SourceStatus {
            source: adapter.id().to_string(),
            cursor: epoch_sentinel(),
            last_tick: None,
            last_outcome: None,
            published: 0,
            up_to_date: 0,
            not_ready: 0,
            failed: 0,
        };
        Self {
            adapter,
            cursor: Mutex::new(epoch_sentinel()),
            in_progress: AtomicBool::new(false),
            status: Mutex::new(status),
        }
    }

    fn cursor(&self) -> DateTime<Utc> {
        *self.cursor.lock().expect("scheduler lock poisoned")
    }

    /// Advance the cursor, never backwards.
    fn advance_cursor(&self, to: DateTime<Utc>) {
        let mut cursor = self.cursor.lock().expect("scheduler lock poisoned");
        if to > *cursor {
            *cursor = to;
        }
    }
}

/// Drives all configured sources on a fixed interval.
pub struct Scheduler {
    slots: Vec<SourceSlot>,
    store: Arc<ForecastStore>,
    interval: Duration,
    operation_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        store: Arc<ForecastStore>,
        interval: Duration,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            slots: adapters.into_iter().map(SourceSlot::new).collect(),
            store,
            interval,
            operation_timeout,
        }
    }

    /// Seed the store and cursors from each source's snapshot cache, so
    /// readers have data immediately after a restart and an unchanged
    /// upstream issuance is not re-downloaded.
    pub async fn seed(&self) {
        for slot in &self.slots {
            let source = slot.adapter.id();
            if let Some(dataset) = slot.adapter.restore().await {
                let reference_time = dataset.forecast_reference_time;
                self.store.update(source, Arc::new(dataset));
                info!(
                    source = %source,
                    reference_time = %reference_time,
                    "Seeded store from snapshot cache"
                );
            }
            match slot.adapter.baseline().await {
                Some(baseline) => {
                    slot.advance_cursor(baseline);
                    self.sync_status_cursor(slot);
                    info!(source = %source, baseline = %baseline,
                        "Seeded freshness cursor from cache baseline");
                }
                None => {
                    debug!(source = %source, "No cache baseline, epoch sentinel applies");
                }
            }
        }
    }

    /// Refresh a single source. Never panics, never propagates; the
    /// outcome says what happened.
    pub async fn refresh(&self, source: SourceId) -> TickOutcome {
        let Some(slot) = self.slots.iter().find(|s| s.adapter.id() == source) else {
            return TickOutcome::Failed {
                kind: "config_error".to_string(),
                message: format!("no adapter configured for source {}", source),
            };
        };

        if slot
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(source = %source, "Refresh already in progress, skipping tick");
            return TickOutcome::InProgress;
        }

        let outcome = self.tick(slot).await;
        slot.in_progress.store(false, Ordering::SeqCst);
        self.record(slot, &outcome);
        outcome
    }

    async fn tick(&self, slot: &SourceSlot) -> TickOutcome {
        let source = slot.adapter.id();

        let probed = match timeout(self.operation_timeout, slot.adapter.probe()).await {
            Ok(Ok(issuance)) => issuance,
            Ok(Err(e)) => return TickOutcome::failed(e),
            Err(_) => {
                return TickOutcome::failed(RefreshError::SourceUnavailable {
                    source,
                    message: format!("probe timed out after {:?}", self.operation_timeout),
                })
            }
        };

        let cursor = slot.cursor();
        if probed <= cursor {
            debug!(source = %source, probed = %probed, cursor = %cursor, "Issuance unchanged");
            return TickOutcome::UpToDate;
        }

        info!(source = %source, probed = %probed, cursor = %cursor, "New issuance detected");

        let fragments = match timeout(self.operation_timeout, slot.adapter.retrieve()).await {
            Ok(Ok(fragments)) => fragments,
            Ok(Err(e)) => return TickOutcome::failed(e),
            Err(_) => {
                return TickOutcome::failed(RefreshError::Retrieval {
                    source,
                    message: format!("retrieval timed out after {:?}", self.operation_timeout),
                })
            }
        };

        // A run whose upstream publication is still in progress can come
        // back without required coordinates. That is expected; keep the
        // previous dataset and retry next tick.
        for fragment in &fragments {
            let missing = fragment.missing_coords();
            if !missing.is_empty() {
                let missing = missing.join(",");
                info!(source = %source, missing = %missing,
                    "Retrieved dataset not ready yet, retaining previous");
                return TickOutcome::NotReady { missing };
            }
        }

        let merged = match merge_fragments(source, fragments) {
            Ok(merged) => merged,
            Err(e) => return TickOutcome::failed(e),
        };

        let canonical = match normalize(slot.adapter.mapping(), &merged) {
            Ok(canonical) => canonical,
            Err(e) => return TickOutcome::failed(e),
        };

        let reference_time = canonical.forecast_reference_time;
        let dataset = Arc::new(canonical);
        self.store.update(source, dataset.clone());

        // Snapshot write failures degrade restart behavior only; the
        // in-memory publish already happened.
        if let Err(e) = slot.adapter.persist(&dataset).await {
            warn!(source = %source, error = %e, "Failed to persist snapshot cache");
        }

        // Advance to the issuance actually accepted, not the probed one:
        // when a provider's metadata runs ahead of its payload, the next
        // tick must retry rather than pin to the announcement.
        slot.advance_cursor(reference_time);
        TickOutcome::Published { reference_time }
    }

    fn record(&self, slot: &SourceSlot, outcome: &TickOutcome) {
        let mut status = slot.status.lock().expect("scheduler lock poisoned");
        match outcome {
            TickOutcome::Published { .. } => status.published += 1,
            TickOutcome::UpToDate => status.up_to_date += 1,
            TickOutcome::NotReady { .. } => status.not_ready += 1,
            TickOutcome::Failed { .. } => status.failed += 1,
            TickOutcome::InProgress => {}
        }
        status.last_tick = Some(Utc::now());
        status.last_outcome = Some(outcome.clone());
        drop(status);
        self.sync_status_cursor(slot);
    }

    fn sync_status_cursor(&self, slot: &SourceSlot) {
        let cursor = slot.cursor();
        slot.status.lock().expect("scheduler lock poisoned").cursor = cursor;
    }

    /// Run one refresh tick over all sources. A failing source never
    /// blocks or aborts the others.
    pub async fn run_all(&self) {
        for slot in &self.slots {
            let source = slot.adapter.id();
            match self.refresh(source).await {
                TickOutcome::Published { reference_time } => {
                    info!(source = %source, reference_time = %reference_time,
                        "Published new dataset");
                }
                TickOutcome::UpToDate => {
                    debug!(source = %source, "Source up to date");
                }
                TickOutcome::NotReady { missing } => {
                    info!(source = %source, missing = %missing, "Source not ready yet");
                }
                TickOutcome::InProgress => {}
                TickOutcome::Failed { kind, message } => {
                    error!(source = %source, kind = %kind, error = %message, "Refresh failed");
                }
            }
        }
    }

    /// Run continuously: one unconditional tick at startup, then one per
    /// interval until shutdown.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval = ?self.interval, "Starting refresh loop");
        self.run_all().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.run_all().await;
                }
            }
        }
    }

    /// Per-source status snapshot for the status API.
    pub fn status_report(&self) -> Vec<SourceStatus> {
        self.slots
            .iter()
            .map(|slot| slot.status.lock().expect("scheduler lock poisoned").clone())
            .collect()
    }

    /// Current freshness cursor for a source.
    pub fn cursor(&self, source: SourceId) -> Option<DateTime<Utc>> {
        self.slots
            .iter()
            .find(|s| s.adapter.id() == source)
            .map(|s| s.cursor())
    }
}
