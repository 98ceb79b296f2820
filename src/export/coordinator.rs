//! Single-flight coordination of the export job slot.
//!
//! [`JobCoordinator`] owns the one [`ExportJob`] slot. A successful
//! [`start_job`](JobCoordinator::start_job) flips the slot to running and
//! spawns one driver task that sends the backend start request and then polls
//! the backend status on a fixed interval, applying each update to the slot.
//! Because the driver is only spawned on the accepted idle-to-running
//! transition, the poll loop can never be duplicated. Any number of observers
//! read the slot through [`snapshot`](JobCoordinator::snapshot).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::BackendClient;
use super::job::{ExportJob, ExportOptions, JobPhase, JobRejected, JobSnapshot};

/// Narrow view of the supervisor the coordinator gates on.
pub trait ReadinessProbe: Send + Sync {
    /// True while the worker process is confirmed able to accept requests.
    fn is_ready(&self) -> bool;
}

pub struct JobCoordinator {
    job: Arc<Mutex<ExportJob>>,
    client: Arc<BackendClient>,
    probe: Arc<dyn ReadinessProbe>,
    poll_interval: Duration,
}

impl JobCoordinator {
    pub fn new(
        client: Arc<BackendClient>,
        probe: Arc<dyn ReadinessProbe>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            job: Arc::new(Mutex::new(ExportJob::new())),
            client,
            probe,
            poll_interval,
        }
    }

    /// Requests a new export run.
    ///
    /// Denied while a run is in flight (`AlreadyRunning`) or while the worker
    /// is not ready (`BackendUnavailable`); rejection leaves the slot
    /// untouched. On acceptance the backend delegation happens in a spawned
    /// task and the caller returns immediately with the run id.
    pub fn start_job(&self, options: ExportOptions) -> Result<Uuid, JobRejected> {
        let run_id = {
            let mut job = lock(&self.job);
            if job.phase() == JobPhase::Running {
                return Err(JobRejected::AlreadyRunning);
            }
            if !self.probe.is_ready() {
                return Err(JobRejected::BackendUnavailable);
            }
            job.begin(options)?
        };

        let client = Arc::clone(&self.client);
        let job = Arc::clone(&self.job);
        let interval = self.poll_interval;
        tokio::spawn(async move {
            drive(client, job, options, interval, run_id).await;
        });

        Ok(run_id)
    }

    /// Atomic read of the job slot. Always succeeds, idle defaults before any
    /// run was ever started.
    pub fn snapshot(&self) -> JobSnapshot {
        lock(&self.job).snapshot()
    }
}

// A poisoned lock only means a panicking writer; the slot data is still the
// latest committed state, so recover it instead of propagating the panic.
fn lock(job: &Mutex<ExportJob>) -> MutexGuard<'_, ExportJob> {
    job.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One run: start request, then fixed-interval status polling until the slot
/// leaves the running phase.
async fn drive(
    client: Arc<BackendClient>,
    job: Arc<Mutex<ExportJob>>,
    options: ExportOptions,
    interval: Duration,
    run_id: Uuid,
) {
    info!(%run_id, force_reexport = options.force_reexport, "starting export");

    if let Err(err) = client.start_export(options.force_reexport).await {
        warn!(%run_id, error = %err, "export start request failed");
        lock(&job).fail(&err.to_string());
        return;
    }

    loop {
        tokio::time::sleep(interval).await;

        match client.export_status().await {
            Ok(status) => {
                let mut slot = lock(&job);
                slot.apply(&status);
                if slot.phase() != JobPhase::Running {
                    break;
                }
            }
            // Transient: a single failed read never ends the run, the next
            // tick tries again.
            Err(err) => warn!(%run_id, error = %err, "status poll failed"),
        }
    }

    let outcome = lock(&job).snapshot();
    info!(%run_id, phase = %outcome.phase, progress = outcome.progress, "export finished");
}
