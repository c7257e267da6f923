//! Throttle-aware write path for the spreadsheet store.
//!
//! Every failure degrades to a `false` return plus a logged message;
//! nothing propagates past this boundary. Callers decide whether to
//! skip or re-queue, and a failure is always local to one record.

use super::{RangeUpdate, SheetsError, SpreadsheetStore};
use std::time::Duration;
use tracing::{debug, error, warn};

enum WriteOp<'a> {
    Set(&'a RangeUpdate),
    Batch(&'a [RangeUpdate]),
    Append {
        range: &'a str,
        rows: &'a [Vec<String>],
    },
}

impl WriteOp<'_> {
    fn describe(&self) -> String {
        match self {
            WriteOp::Set(update) => format!("set {}", update.range),
            WriteOp::Batch(updates) => format!("batch of {} ranges", updates.len()),
            WriteOp::Append { range, rows } => format!("append {} rows to {}", rows.len(), range),
        }
    }

    async fn execute(
        &self,
        store: &dyn SpreadsheetStore,
        spreadsheet_id: &str,
    ) -> Result<(), SheetsError> {
        match self {
            WriteOp::Set(update) => store.set_range(spreadsheet_id, update).await,
            WriteOp::Batch(updates) => store.batch_set(spreadsheet_id, updates).await,
            WriteOp::Append { range, rows } => {
                store.append_rows(spreadsheet_id, range, rows).await
            }
        }
    }
}

/// Attempt `op` up to `max_retries` times, sleeping `2^attempt + 1`
/// seconds between throttled attempts. Any non-throttling failure
/// aborts immediately.
async fn write_op(
    store: &dyn SpreadsheetStore,
    spreadsheet_id: &str,
    op: WriteOp<'_>,
    max_retries: u32,
) -> bool {
    let attempts = max_retries.max(1);
    for attempt in 0..attempts {
        match op.execute(store, spreadsheet_id).await {
            Ok(()) => {
                debug!("Write succeeded: {}", op.describe());
                return true;
            }
            Err(SheetsError::RateLimited) => {
                if attempt + 1 < attempts {
                    let delay = Duration::from_secs(2u64.saturating_pow(attempt) + 1);
                    warn!(
                        "Throttled on {} (attempt {}/{}), backing off {:?}",
                        op.describe(),
                        attempt + 1,
                        attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => {
                error!("Write failed: {}: {}", op.describe(), e);
                return false;
            }
        }
    }

    error!(
        "Giving up on {} after {} throttled attempts",
        op.describe(),
        attempts
    );
    false
}

/// One remote set-cells call with the throttling retry policy.
pub async fn set_range(
    store: &dyn SpreadsheetStore,
    spreadsheet_id: &str,
    update: &RangeUpdate,
    max_retries: u32,
) -> bool {
    write_op(store, spreadsheet_id, WriteOp::Set(update), max_retries).await
}

/// One bulk multi-range call with the throttling retry policy.
pub async fn batch_set(
    store: &dyn SpreadsheetStore,
    spreadsheet_id: &str,
    updates: &[RangeUpdate],
    max_retries: u32,
) -> bool {
    write_op(store, spreadsheet_id, WriteOp::Batch(updates), max_retries).await
}

/// One bulk append call with the throttling retry policy.
pub async fn append_rows(
    store: &dyn SpreadsheetStore,
    spreadsheet_id: &str,
    range: &str,
    rows: &[Vec<String>],
    max_retries: u32,
) -> bool {
    write_op(
        store,
        spreadsheet_id,
        WriteOp::Append { range, rows },
        max_retries,
    )
    .await
}

/// Collects sparse cell-range writes and flushes them as one bulk call.
///
/// Queueing past the threshold flushes automatically; stages also call
/// `flush` at stage end so nothing queued is lost at process exit.
pub struct BatchAccumulator {
    spreadsheet_id: String,
    flush_threshold: usize,
    max_retries: u32,
    queued: Vec<RangeUpdate>,
}

impl BatchAccumulator {
    pub fn new(spreadsheet_id: impl Into<String>, flush_threshold: usize, max_retries: u32) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            flush_threshold: flush_threshold.max(1),
            max_retries,
            queued: Vec::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.queued.len()
    }

    /// Queue one range update, flushing if the threshold is reached.
    /// Returns false only when a triggered flush failed.
    pub async fn queue(&mut self, store: &dyn SpreadsheetStore, update: RangeUpdate) -> bool {
        self.queued.push(update);
        if self.queued.len() >= self.flush_threshold {
            return self.flush(store).await;
        }
        true
    }

    /// Issue one bulk call for everything queued. Clears the queue on
    /// success; on failure the updates stay queued for a later flush.
    pub async fn flush(&mut self, store: &dyn SpreadsheetStore) -> bool {
        if self.queued.is_empty() {
            return true;
        }

        let ok = batch_set(store, &self.spreadsheet_id, &self.queued, self.max_retries).await;
        if ok {
            debug!("Flushed {} queued range updates", self.queued.len());
            self.queued.clear();
        }
        ok
    }
}
