use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::ingest::poller::Poller;
use crate::state::{ServiceStatus, ServiceStatusRegistry};

/// Status registry key for the primary ingestion schedule.
pub const INGEST_SERVICE: &str = "ingest";

/// Status registry key for the supplementary source schedule.
pub const SUPPLEMENTARY_SERVICE: &str = "supplementary";

/// The secondary upstream. Its data feed is not available, so every tick
/// reports that instead of quietly doing nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SupplementarySource;

impl SupplementarySource {
    pub fn is_available(&self) -> bool {
        false
    }
}

/// A primary run in flight: the run itself and the task supervising it.
struct PrimaryRun {
    run: AbortHandle,
    supervisor: JoinHandle<()>,
}

impl PrimaryRun {
    fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    fn abort(&self) {
        self.run.abort();
        self.supervisor.abort();
    }
}

/// Drives the primary and supplementary schedules until cancelled.
///
/// Each schedule has its own interval. A primary tick that fires while the
/// previous primary run is still going is skipped. Every run executes in its
/// own task, so a panic inside a run is reported and answered with the sample
/// fallback without stopping the loop.
pub struct Scheduler {
    poller: Arc<Mutex<Poller>>,
    supplementary: SupplementarySource,
    statuses: ServiceStatusRegistry,
    poll_interval: Duration,
    supplementary_interval: Duration,
    shutdown_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        poller: Arc<Mutex<Poller>>,
        statuses: ServiceStatusRegistry,
        poll_interval: Duration,
        supplementary_interval: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            poller,
            supplementary: SupplementarySource,
            statuses,
            poll_interval,
            supplementary_interval,
            shutdown_timeout,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            poll_interval = ?self.poll_interval,
            supplementary_interval = ?self.supplementary_interval,
            "Ingestion scheduler started"
        );
        self.statuses.set(INGEST_SERVICE, ServiceStatus::Starting);

        if let Err(e) = self.poller.lock().await.seed().await {
            warn!(error = ?e, "Failed to seed recent cache, starting empty");
        }

        let mut primary = time::interval(self.poll_interval);
        primary.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut supplementary = time::interval(self.supplementary_interval);
        supplementary.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut current_run: Option<PrimaryRun> = None;

        loop {
            tokio::select! {
                _ = primary.tick() => {
                    // Skip this tick if the previous run is still going.
                    if let Some(ref handle) = current_run
                        && !handle.is_finished()
                    {
                        trace!("Previous ingestion run still in progress, skipping tick");
                        continue;
                    }
                    current_run = Some(self.spawn_primary());
                }
                _ = supplementary.tick() => {
                    self.run_supplementary();
                }
                _ = shutdown.cancelled() => {
                    info!("Ingestion scheduler received shutdown signal");

                    if let Some(mut current) = current_run.take() {
                        if time::timeout(self.shutdown_timeout, &mut current.supervisor)
                            .await
                            .is_err()
                        {
                            warn!(
                                timeout = ?self.shutdown_timeout,
                                "Ingestion run did not finish in time, aborting"
                            );
                            current.abort();
                        } else {
                            trace!("Ingestion run finished before shutdown");
                        }
                    }

                    info!("Ingestion scheduler exiting");
                    break;
                }
            }
        }
    }

    fn spawn_primary(&self) -> PrimaryRun {
        let poller = self.poller.clone();
        let statuses = self.statuses.clone();

        let run = tokio::spawn({
            let poller = poller.clone();
            async move { poller.lock().await.run_primary().await }
        });
        let run_abort = run.abort_handle();

        let supervisor = tokio::spawn(async move {
            match run.await {
                Ok(outcome) => {
                    let status = if outcome.fell_back() {
                        ServiceStatus::Error
                    } else {
                        ServiceStatus::Active
                    };
                    statuses.set(INGEST_SERVICE, status);
                }
                Err(e) if e.is_cancelled() => {
                    debug!("Ingestion run cancelled");
                }
                Err(e) => {
                    error!(error = ?e, "Ingestion run aborted, broadcasting sample records");
                    poller.lock().await.emit_fallback(Utc::now());
                    statuses.set(INGEST_SERVICE, ServiceStatus::Error);
                }
            }
        });

        PrimaryRun {
            run: run_abort,
            supervisor,
        }
    }

    fn run_supplementary(&self) {
        if !self.supplementary.is_available() {
            info!("Supplementary source has no data available");
            self.statuses
                .set(SUPPLEMENTARY_SERVICE, ServiceStatus::Disabled);
        }
    }
}
