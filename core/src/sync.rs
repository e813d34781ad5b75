//! The list → diff → fetch → persist pipeline.
//!
//! # Design
//! Listing and key enumeration run first, on the calling thread; either
//! failing aborts the run before anything is written. The per-item stage runs
//! on a bounded set of scoped worker threads. Workers claim items through an
//! atomic cursor and report each outcome over a channel; the calling thread
//! is the only one that touches `RunOutcome`. Cancellation is checked before
//! every claim, so an item that has started always finishes.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

use crate::client::JGrantsClient;
use crate::config::SyncConfig;
use crate::detail::DetailClient;
use crate::error::{Result, SyncError};
use crate::existing::load_existing;
use crate::listing::ListingClient;
use crate::query::ListingQuery;
use crate::store::{object_key, RecordStore};
use crate::transport::{Transport, UreqTransport};
use crate::types::SubsidySummary;

/// Cooperative cancellation flag shared between a trigger and a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub new_count: usize,
    pub saved_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    /// Set when cancellation left some new items unprocessed.
    pub cancelled: bool,
    /// Failed IDs in listing order.
    pub failed_ids: Vec<String>,
}

impl RunOutcome {
    pub fn processed(&self) -> usize {
        self.saved_count + self.failed_count + self.skipped_count
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new: {}, saved: {}, failed: {}, skipped: {}",
            self.new_count, self.saved_count, self.failed_count, self.skipped_count
        )?;
        if self.cancelled {
            write!(f, " (cancelled after {} items)", self.processed())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemOutcome {
    Saved,
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub container: String,
    pub max_items: Option<usize>,
    pub skip_empty: bool,
    pub concurrency: usize,
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            container: config.container.clone(),
            max_items: config.max_items,
            skip_empty: config.skip_empty,
            concurrency: config.concurrency,
        }
    }
}

pub struct SyncOrchestrator {
    listing: ListingClient,
    detail: DetailClient,
    store: Arc<dyn RecordStore>,
    query: ListingQuery,
    options: SyncOptions,
}

impl SyncOrchestrator {
    pub fn new(
        listing: ListingClient,
        detail: DetailClient,
        store: Arc<dyn RecordStore>,
        query: ListingQuery,
        options: SyncOptions,
    ) -> Self {
        Self {
            listing,
            detail,
            store,
            query,
            options,
        }
    }

    /// Wire an orchestrator from configuration. Invalid settings surface as
    /// `SyncError::Config`.
    pub fn from_config(
        config: &SyncConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        config.validate()?;
        let api = JGrantsClient::new(&config.base_url);
        Ok(Self::new(
            ListingClient::new(api.clone(), transport.clone()),
            DetailClient::new(api, transport, config.exclusion.clone()),
            store,
            config.query.clone(),
            SyncOptions::from(config),
        ))
    }

    /// `from_config` with the HTTP transport and the store the configuration
    /// names.
    pub fn connect(config: &SyncConfig) -> Result<Self> {
        let transport = Arc::new(
            UreqTransport::new(config.request_timeout).with_max_body_bytes(config.max_body_bytes),
        );
        Self::from_config(config, transport, config.connection.open())
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Execute one run.
    ///
    /// Fails only when the listing or the existing-key enumeration fails.
    /// Per-item failures are counted in the returned outcome.
    pub fn run(&self, cancel: &CancelToken) -> Result<RunOutcome> {
        let span = info_span!(
            "sync_run",
            run_id = %Uuid::new_v4(),
            container = %self.options.container,
        );
        let _entered = span.enter();
        let started = Instant::now();

        info!(acceptance = %self.query.acceptance, "fetching subsidy listing");
        let listing = self
            .listing
            .fetch_listing(&self.query)
            .map_err(SyncError::Listing)?;
        info!(
            rows = listing.result.len(),
            total = listing.total_count(),
            "listing fetched"
        );

        let existing = load_existing(self.store.as_ref(), &self.options.container)
            .map_err(SyncError::ExistingKeys)?;
        info!(existing = existing.len(), "existing records loaded");

        let new_items = plan_new_items(listing.result, &existing, self.options.max_items);
        let mut outcome = RunOutcome {
            new_count: new_items.len(),
            ..RunOutcome::default()
        };
        if new_items.is_empty() {
            info!("no new subsidies");
            return Ok(outcome);
        }
        info!(new = new_items.len(), "processing new subsidies");

        let mut results = self.process_items(&new_items, cancel, &span);
        results.sort_by_key(|(index, _)| *index);
        for (index, item) in results {
            match item {
                ItemOutcome::Saved => outcome.saved_count += 1,
                ItemOutcome::Skipped => outcome.skipped_count += 1,
                ItemOutcome::Failed => {
                    outcome.failed_count += 1;
                    outcome.failed_ids.push(new_items[index].id.clone());
                }
            }
        }
        outcome.cancelled = outcome.processed() < outcome.new_count;

        info!(
            new = outcome.new_count,
            saved = outcome.saved_count,
            failed = outcome.failed_count,
            skipped = outcome.skipped_count,
            cancelled = outcome.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sync run finished"
        );
        Ok(outcome)
    }

    fn process_items(
        &self,
        items: &[SubsidySummary],
        cancel: &CancelToken,
        span: &Span,
    ) -> Vec<(usize, ItemOutcome)> {
        let workers = self.options.concurrency.clamp(1, items.len());
        let cursor = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                scope.spawn(move || {
                    let _entered = span.enter();
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let index = cursor.fetch_add(1, Ordering::SeqCst);
                        let Some(item) = items.get(index) else {
                            break;
                        };
                        if tx.send((index, self.process_item(item))).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        if cancel.is_cancelled() {
            warn!("run cancelled, remaining items left for the next run");
        }
        rx.into_iter().collect()
    }

    fn process_item(&self, item: &SubsidySummary) -> ItemOutcome {
        let id = item.id.as_str();
        debug!(id, title = %short_title(&item.title), "fetching detail");

        let record = match self.detail.fetch_detail(id) {
            Ok(record) => record,
            Err(e) => {
                warn!(id, error = %e, "detail fetch failed");
                return ItemOutcome::Failed;
            }
        };

        if record.empty && self.options.skip_empty {
            info!(id, "detail has no attachments, skipping");
            return ItemOutcome::Skipped;
        }

        let bytes = match serde_json::to_vec_pretty(&record.response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(id, error = %e, "could not encode detail");
                return ItemOutcome::Failed;
            }
        };

        let key = object_key(id);
        match self
            .store
            .write_object(&self.options.container, &key, &bytes, true)
        {
            Ok(()) => {
                debug!(id, bytes = bytes.len(), "record saved");
                ItemOutcome::Saved
            }
            Err(e) => {
                warn!(id, error = %e, "record write failed");
                ItemOutcome::Failed
            }
        }
    }
}

/// Listing rows whose ID is not yet stored, in listing order, each ID at most
/// once, capped at `max_items`.
pub fn plan_new_items(
    listing: Vec<SubsidySummary>,
    existing: &HashSet<String>,
    max_items: Option<usize>,
) -> Vec<SubsidySummary> {
    let mut seen = HashSet::new();
    let mut new_items: Vec<SubsidySummary> = listing
        .into_iter()
        .filter(|item| !existing.contains(&item.id) && seen.insert(item.id.clone()))
        .collect();
    if let Some(cap) = max_items {
        if new_items.len() > cap {
            info!(uncapped = new_items.len(), cap, "capping new items for this run");
            new_items.truncate(cap);
        }
    }
    new_items
}

fn short_title(title: &str) -> String {
    title.chars().take(50).collect()
}
