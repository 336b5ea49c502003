use crate::aggregator;
use crate::descriptor::DescriptorReader;
use crate::probe;
use crate::types::{AggregateReport, ProbeOutcome, ProxyDescriptor};
use anyhow::{bail, Context, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Hard upper bound on the ceiling, whatever the caller asks for.
const MAX_CEILING: usize = 5_000;

/// Probe every descriptor from `reader` with at most `concurrency` connects in flight.
///
/// - Admission is gated by a `Semaphore`; a new probe starts as soon as any running one finishes.
/// - Input is pulled one line at a time, so memory is bounded by the ceiling, not the file.
/// - A failing probe becomes a failure outcome; only read errors or a crashed task abort the batch.
pub async fn probe_proxies<R>(
    reader: DescriptorReader<R>,
    concurrency: usize,
    timeout: Duration,
) -> Result<AggregateReport>
where
    R: AsyncRead + Unpin,
{
    probe_proxies_with_cancel(reader, concurrency, timeout, CancellationToken::new()).await
}

/// Variant that accepts a `CancellationToken` to allow external cancellation.
pub async fn probe_proxies_with_cancel<R>(
    reader: DescriptorReader<R>,
    concurrency: usize,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<AggregateReport>
where
    R: AsyncRead + Unpin,
{
    probe_proxies_with(
        reader,
        concurrency,
        cancel,
        SharedProgress::new(),
        move |d| probe::probe(d, timeout),
    )
    .await
}

/// Live counters for a running batch. Clones share the same counters.
#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub admitted: Arc<AtomicU64>,
    pub completed: Arc<AtomicU64>,
    pub succeeded: Arc<AtomicU64>,
    pub in_flight: Arc<AtomicU64>,
    pub peak_in_flight: Arc<AtomicU64>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            admitted: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            succeeded: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            peak_in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> u64 {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    fn on_admit(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    fn on_complete(&self, success: bool) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.completed.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Core scheduler, generic over the probe so callers can supply their own.
pub async fn probe_proxies_with<R, F, Fut>(
    mut reader: DescriptorReader<R>,
    concurrency: usize,
    cancel: CancellationToken,
    shared: SharedProgress,
    probe_fn: F,
) -> Result<AggregateReport>
where
    R: AsyncRead + Unpin,
    F: Fn(ProxyDescriptor) -> Fut,
    Fut: Future<Output = ProbeOutcome> + Send + 'static,
{
    let ceiling = concurrency.clamp(1, MAX_CEILING);
    let sem = Arc::new(Semaphore::new(ceiling));
    let (tx, rx) = mpsc::channel::<ProbeOutcome>(ceiling);
    let collector = tokio::spawn(aggregator::collect(rx, shared.clone()));
    let mut set = JoinSet::new();

    let admitted = async {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some(descriptor) = reader.next_descriptor().await? else {
                break;
            };

            let permit = tokio::select! {
                p = sem.clone().acquire_owned() => p.context("probe semaphore closed")?,
                _ = cancel.cancelled() => break,
            };
            reap_finished(&mut set)?;

            shared.on_admit();
            let tx = tx.clone();
            let shared = shared.clone();
            set.spawn(run_one(probe_fn(descriptor), shared, tx, permit));
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    drop(tx);

    if let Err(e) = admitted {
        set.shutdown().await;
        collector.abort();
        return Err(e);
    }

    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            set.shutdown().await;
            collector.abort();
            return Err(e).context("probe task failed");
        }
    }

    let agg = collector.await.context("aggregator task failed")?;

    if cancel.is_cancelled() {
        bail!(
            "batch cancelled after {} of {} admitted probes",
            agg.recorded(),
            shared.admitted()
        );
    }
    if agg.recorded() != shared.admitted() {
        bail!(
            "lost probe outcomes: {} admitted, {} recorded",
            shared.admitted(),
            agg.recorded()
        );
    }

    Ok(agg.finalize())
}

/// Body of one probe task. The permit is held until the outcome is handed off, so live
/// tasks never exceed the ceiling even when the collector falls behind.
async fn run_one<Fut>(
    probe: Fut,
    shared: SharedProgress,
    tx: mpsc::Sender<ProbeOutcome>,
    permit: OwnedSemaphorePermit,
) where
    Fut: Future<Output = ProbeOutcome>,
{
    let outcome = probe.await;
    shared.on_complete(outcome.success);
    // Only fails if the collector is gone; that surfaces when it is joined.
    let _ = tx.send(outcome).await;
    drop(permit);
}

/// Drop join handles of already finished probes so the set does not grow with the input.
fn reap_finished(set: &mut JoinSet<()>) -> Result<()> {
    while let Some(res) = set.try_join_next() {
        res.context("probe task failed")?;
    }
    Ok(())
}
