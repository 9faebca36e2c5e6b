//! Background fetch worker
//!
//! One worker fetches every symbol of a watchlist snapshot, then hands the
//! whole batch back to the foreground over a channel. It never touches the
//! render buffer or refresh state.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::FetchFailure;
use crate::quote::{FetchOutcome, QuoteClient, QuoteRecord};

/// Where a batch was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOrigin {
    Inline,
    Background,
}

/// Records produced by one refresh cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub origin: BatchOrigin,
    pub dispatched_at: DateTime<Utc>,
    pub records: Vec<QuoteRecord>,
    pub failures: Vec<(String, FetchFailure)>,
}

impl Batch {
    pub fn background(dispatched_at: DateTime<Utc>, records: Vec<QuoteRecord>) -> Self {
        Self {
            origin: BatchOrigin::Background,
            dispatched_at,
            records,
            failures: Vec::new(),
        }
    }
}

/// Fetch `symbols` one after another, keeping input order.
pub async fn fetch_batch(
    client: &QuoteClient,
    symbols: &[String],
) -> (Vec<QuoteRecord>, Vec<(String, FetchFailure)>) {
    let mut records = Vec::with_capacity(symbols.len());
    let mut failures = Vec::new();

    for symbol in symbols {
        match client.fetch(symbol).await {
            FetchOutcome::Record(record) => records.push(record),
            FetchOutcome::Failure(failure) => failures.push((symbol.clone(), failure)),
        }
    }

    (records, failures)
}

/// Handle on a spawned worker task
#[derive(Debug)]
pub struct Worker {
    id: u64,
    spawned_at: Instant,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Spawn a worker that gives up after `deadline` without reporting.
    pub fn spawn(
        id: u64,
        client: QuoteClient,
        symbols: Vec<String>,
        dispatched_at: DateTime<Utc>,
        deadline: Duration,
        batch_tx: mpsc::UnboundedSender<Batch>,
        now: Instant,
    ) -> Self {
        let handle = tokio::spawn(async move {
            debug!(worker = id, symbols = symbols.len(), "Worker started");

            match tokio::time::timeout(deadline, fetch_batch(&client, &symbols)).await {
                Ok((records, failures)) => {
                    let batch = Batch {
                        origin: BatchOrigin::Background,
                        dispatched_at,
                        records,
                        failures,
                    };
                    if batch_tx.send(batch).is_err() {
                        debug!(worker = id, "Engine gone, dropping batch");
                    }
                }
                Err(_) => {
                    warn!(worker = id, deadline_secs = deadline.as_secs(), "Worker deadline reached, abandoning batch");
                }
            }
        });

        Self {
            id,
            spawned_at: now,
            handle,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn is_overdue(&self, now: Instant, deadline: Duration) -> bool {
        now.saturating_duration_since(self.spawned_at) >= deadline
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}
