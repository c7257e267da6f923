//! Stage orchestration: Transcript Sync, Cross-Sheet Propagation,
//! then Analysis, strictly in that order.
//!
//! Setup failures (missing headers, unreadable config) abort before
//! any stage writes. A stage failing mid-run is logged and the run
//! continues; every completed write is idempotent, so the next
//! invocation picks up whatever was left undone.

use crate::analysis::AnalysisModel;
use crate::config::Config;
use crate::docs::DocumentStore;
use crate::sheets::{RateLimiter, SpreadsheetStore};
use crate::source::TranscriptSource;
use anyhow::Result;
use tracing::{error, info};

pub mod analyze;
pub mod propagate;
pub mod sync;

/// The four external collaborators, injected so tests can substitute
/// in-memory fakes.
pub struct Stores<'a> {
    pub source: &'a dyn TranscriptSource,
    pub docs: &'a dyn DocumentStore,
    pub sheets: &'a dyn SpreadsheetStore,
    pub model: &'a dyn AnalysisModel,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub tracked: usize,
    pub propagated: usize,
    pub analyzed: usize,
}

pub async fn run(stores: &Stores<'_>, cfg: &Config) -> Result<RunSummary> {
    // Header resolution doubles as the setup check: a missing required
    // header aborts here, before any stage writes.
    let columns = propagate::resolve_headers(stores.sheets, cfg).await?;

    let tracked = match sync::run(stores.source, stores.docs, stores.sheets, cfg).await {
        Ok(count) => count,
        Err(e) => {
            error!("Transcript sync stage failed: {:#}", e);
            0
        }
    };

    let propagated = match propagate::run(stores.sheets, cfg, &columns).await {
        Ok(count) => count,
        Err(e) => {
            error!("Propagation stage failed: {:#}", e);
            0
        }
    };

    let mut limiter = RateLimiter::new(cfg.limits.calls_per_window, cfg.limits.window_secs);
    let analyzed = match analyze::run(
        stores.docs,
        stores.sheets,
        stores.model,
        cfg,
        &columns,
        &mut limiter,
    )
    .await
    {
        Ok(count) => count,
        Err(e) => {
            error!("Analysis stage failed: {:#}", e);
            0
        }
    };

    let summary = RunSummary {
        tracked,
        propagated,
        analyzed,
    };
    info!(
        "Run complete: {} tracked, {} propagated, {} analyzed",
        summary.tracked, summary.propagated, summary.analyzed
    );
    Ok(summary)
}
