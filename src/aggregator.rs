use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::scheduler::SharedProgress;
use crate::types::{AggregateReport, ProbeOutcome};

/// Log a progress line every this many completed probes.
const PROGRESS_EVERY: u64 = 10;

/// Accumulates probe outcomes and ranks the successful ones.
///
/// Owned by exactly one task; outcomes reach it through a channel, so it needs no locking.
#[derive(Debug, Default)]
pub struct Aggregator {
    seen: HashSet<usize>,
    successes: Vec<ProbeOutcome>,
    failure_count: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome. Returns `false` (and keeps the first) when this index was already recorded.
    pub fn record(&mut self, outcome: ProbeOutcome) -> bool {
        if !self.seen.insert(outcome.index()) {
            warn!(index = outcome.index(), "duplicate outcome ignored");
            return false;
        }
        if outcome.success {
            self.successes.push(outcome);
        } else {
            self.failure_count += 1;
        }
        true
    }

    pub fn recorded(&self) -> u64 {
        self.seen.len() as u64
    }

    /// Rank successes by latency, ties by input order, and produce the report.
    pub fn finalize(mut self) -> AggregateReport {
        self.successes
            .sort_by_key(|o| (o.latency_ms.unwrap_or(u64::MAX), o.index()));
        AggregateReport {
            total_count: self.seen.len() as u64,
            success_count: self.successes.len() as u64,
            failure_count: self.failure_count,
            ordered_successes: self.successes,
        }
    }
}

/// Drain `rx` until every sender is gone, reporting per-probe results and progress.
pub async fn collect(mut rx: mpsc::Receiver<ProbeOutcome>, progress: SharedProgress) -> Aggregator {
    let mut agg = Aggregator::new();
    while let Some(outcome) = rx.recv().await {
        match (&outcome.latency_ms, &outcome.error) {
            (Some(ms), _) => info!(
                index = outcome.index(),
                proxy = %outcome.descriptor.endpoint(),
                "proxy reached in {ms}ms"
            ),
            (None, reason) => warn!(
                index = outcome.index(),
                proxy = %outcome.descriptor.endpoint(),
                "proxy failed: {}",
                reason.as_deref().unwrap_or("unknown error")
            ),
        }

        if !agg.record(outcome) {
            continue;
        }

        let done = agg.recorded();
        if progress_line_due(done, false) {
            info!("progress: {done}/{} proxies processed", progress.admitted());
        }
    }

    let done = agg.recorded();
    if progress_line_due(done, true) {
        info!("progress: {done}/{} proxies processed", progress.admitted());
    }
    agg
}

/// Every `PROGRESS_EVERY` outcomes, plus once at the end unless that count was just reported.
fn progress_line_due(done: u64, drained: bool) -> bool {
    if drained {
        done > 0 && done % PROGRESS_EVERY != 0
    } else {
        done % PROGRESS_EVERY == 0
    }
}
