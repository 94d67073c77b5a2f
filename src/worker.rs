// Background scheduler: sleep probe_interval, then Aggregator -> Classifier -> Accumulator
// (-> flush when full), all inside one tick. Ticks never overlap; a slow tick delays the next.
// Cancellation is observed during the sleep and once after it, never mid-tick. A partial batch
// is not flushed on shutdown.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};
use tracing::{Instrument, debug, info};

use crate::accumulator::{BatchAccumulator, FlushReport};
use crate::aggregator::Aggregator;
use crate::audit::AuditSink;
use crate::classifier::{Thresholds, classify};
use crate::metrics::MetricsRegistry;
use crate::models::{HealthAssessment, HealthEvent, HealthStatus};

/// Collaborators owned by (or shared with) the worker.
pub struct WorkerDeps {
    pub aggregator: Arc<Aggregator>,
    pub accumulator: BatchAccumulator,
    pub audit: Arc<AuditSink>,
    pub metrics: Option<Arc<MetricsRegistry>>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

pub struct WorkerConfig {
    pub probe_interval_ms: u64,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
    pub thresholds: Thresholds,
}

/// Counters reported in the periodic stats line and returned when the worker exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub ticks: u64,
    pub non_healthy_ticks: u64,
    pub batches_flushed: u64,
    pub sink_failures: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        if outcome.assessment.status != HealthStatus::Healthy {
            self.non_healthy_ticks += 1;
        }
        if let Some(report) = &outcome.flush {
            self.batches_flushed += 1;
            if !report.is_clean() {
                self.sink_failures += 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub assessment: HealthAssessment,
    pub flush: Option<FlushReport>,
}

/// One pipeline pass. Snapshot creation precedes classification, which precedes accumulation.
pub async fn run_tick(
    aggregator: &Aggregator,
    thresholds: &Thresholds,
    accumulator: &mut BatchAccumulator,
    audit: &AuditSink,
    metrics: Option<&MetricsRegistry>,
) -> TickOutcome {
    let snapshot = aggregator.collect_snapshot().await;
    if let Some(metrics) = metrics {
        metrics.observe(&snapshot);
    }
    let assessment = classify(&snapshot, thresholds);

    if assessment.status != HealthStatus::Healthy {
        audit
            .record_health(HealthEvent::from_assessment(snapshot.timestamp, &assessment))
            .await;
    }

    accumulator.append(snapshot, assessment.clone());
    let flush = if accumulator.should_flush() {
        accumulator.flush().await
    } else {
        None
    };
    TickOutcome { assessment, flush }
}

fn shutdown_requested(rx: &mut oneshot::Receiver<()>) -> bool {
    !matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty))
}

/// Spawns the scheduler. Sending on (or dropping) the shutdown sender stops it.
pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<WorkerStats> {
    let WorkerDeps {
        aggregator,
        mut accumulator,
        audit,
        metrics,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        probe_interval_ms,
        stats_log_interval_secs,
        thresholds,
    } = config;

    let probe_interval = Duration::from_millis(probe_interval_ms);
    let stats_log_interval = Duration::from_secs(stats_log_interval_secs);
    let worker_span = tracing::span!(tracing::Level::DEBUG, "worker", probe_interval_ms);

    tokio::spawn(
        async move {
            let mut stats = WorkerStats::default();
            let mut last_stats_log = Instant::now();

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(probe_interval) => {}
                    _ = &mut shutdown_rx => {
                        debug!("Worker shutting down");
                        break;
                    }
                }
                if shutdown_requested(&mut shutdown_rx) {
                    debug!("Worker shutting down");
                    break;
                }

                let outcome = run_tick(
                    &aggregator,
                    &thresholds,
                    &mut accumulator,
                    &audit,
                    metrics.as_deref(),
                )
                .await;
                stats.record(&outcome);

                if last_stats_log.elapsed() >= stats_log_interval {
                    info!(
                        ticks = stats.ticks,
                        non_healthy_ticks = stats.non_healthy_ticks,
                        batches_flushed = stats.batches_flushed,
                        sink_failures = stats.sink_failures,
                        buffered_records = accumulator.len(),
                        "app stats"
                    );
                    last_stats_log = Instant::now();
                }
            }

            if !accumulator.is_empty() {
                info!(
                    discarded_records = accumulator.len(),
                    "shutdown with partial batch; records since last flush are dropped"
                );
            }
            stats
        }
        .instrument(worker_span),
    )
}
