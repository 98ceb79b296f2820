use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::backend::ExportStatus;

/// Phase of the single export job slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    Idle,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Idle => write!(f, "idle"),
            JobPhase::Running => write!(f, "running"),
            JobPhase::Completed => write!(f, "completed"),
            JobPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Why a start request was denied. No job state changes on rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JobRejected {
    #[error("an export is already running")]
    AlreadyRunning,
    #[error("the backend is not ready")]
    BackendUnavailable,
}

/// Job-start parameters, fixed for the duration of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub force_reexport: bool,
}

/// One atomic, consistent read of the job slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
}

/// The singleton export job slot.
///
/// All mutation goes through [`begin`](ExportJob::begin),
/// [`apply`](ExportJob::apply) and [`fail`](ExportJob::fail); everything else
/// reads a [`JobSnapshot`]. The externally visible progress never decreases
/// while the job runs, whatever the backend reports.
#[derive(Debug)]
pub struct ExportJob {
    id: Option<Uuid>,
    phase: JobPhase,
    progress: u8,
    message: String,
    error: Option<String>,
    options: ExportOptions,
    started_at: Option<DateTime<Utc>>,
}

impl ExportJob {
    pub fn new() -> Self {
        Self {
            id: None,
            phase: JobPhase::Idle,
            progress: 0,
            message: String::new(),
            error: None,
            options: ExportOptions::default(),
            started_at: None,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn options(&self) -> ExportOptions {
        self.options
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Accepts a start request, resetting the slot for a fresh run.
    ///
    /// Rejected while a run is in flight; the existing run is left untouched.
    pub fn begin(&mut self, options: ExportOptions) -> Result<Uuid, JobRejected> {
        if self.phase == JobPhase::Running {
            return Err(JobRejected::AlreadyRunning);
        }

        let id = Uuid::new_v4();
        self.id = Some(id);
        self.phase = JobPhase::Running;
        self.progress = 0;
        self.message = "starting".to_string();
        self.error = None;
        self.options = options;
        self.started_at = Some(Utc::now());
        Ok(id)
    }

    /// Applies a status update from the backend.
    ///
    /// Only effective while the job runs; a `running == false` update is the
    /// single exit from the running phase, to `Failed` when it carries an
    /// error and to `Completed` otherwise. Updates arriving after a terminal
    /// phase are dropped until the next accepted start.
    pub fn apply(&mut self, status: &ExportStatus) {
        if self.phase != JobPhase::Running {
            return;
        }

        // Monotonic: out-of-order or regressing values never lower progress.
        self.progress = self.progress.max(status.progress_pct());
        if !status.message.is_empty() {
            self.message = status.message.clone();
        }

        if !status.running {
            match &status.error {
                Some(err) => {
                    self.phase = JobPhase::Failed;
                    self.error = Some(err.clone());
                }
                None => {
                    self.phase = JobPhase::Completed;
                }
            }
        }
    }

    /// Terminal failure that did not come through a status read, e.g. the
    /// start request itself was refused.
    pub fn fail(&mut self, detail: &str) {
        if self.phase != JobPhase::Running {
            return;
        }
        self.phase = JobPhase::Failed;
        self.error = Some(detail.to_string());
        self.message = format!("Export failed: {detail}");
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            phase: self.phase,
            progress: self.progress,
            message: self.message.clone(),
            error: self.error.clone(),
        }
    }
}

impl Default for ExportJob {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(running: bool, progress: u32, message: &str, error: Option<&str>) -> ExportStatus {
        ExportStatus {
            running,
            progress,
            message: message.to_string(),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn fresh_job_snapshot_is_idle() {
        let job = ExportJob::new();
        let snap = job.snapshot();
        assert_eq!(snap.phase, JobPhase::Idle);
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.message, "");
        assert!(snap.error.is_none());
    }

    #[test]
    fn begin_resets_slot() {
        let mut job = ExportJob::new();
        job.begin(ExportOptions { force_reexport: true }).unwrap();

        let snap = job.snapshot();
        assert_eq!(snap.phase, JobPhase::Running);
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.message, "starting");
        assert!(snap.error.is_none());
        assert!(job.options().force_reexport);
        assert!(job.started_at().is_some());
    }

    #[test]
    fn begin_rejected_while_running_leaves_state_untouched() {
        let mut job = ExportJob::new();
        let first_id = job.begin(ExportOptions::default()).unwrap();
        job.apply(&status(true, 40, "halfway-ish", None));
        let before = job.snapshot();

        let err = job.begin(ExportOptions { force_reexport: true }).unwrap_err();
        assert_eq!(err, JobRejected::AlreadyRunning);
        assert_eq!(job.snapshot(), before);
        assert!(!job.options().force_reexport);
        assert_eq!(job.id, Some(first_id));
    }

    #[test]
    fn begin_permitted_from_terminal_phases() {
        let mut job = ExportJob::new();
        job.begin(ExportOptions::default()).unwrap();
        job.apply(&status(false, 100, "done", None));
        assert_eq!(job.phase(), JobPhase::Completed);

        job.begin(ExportOptions::default()).unwrap();
        assert_eq!(job.phase(), JobPhase::Running);
        job.fail("boom");
        assert_eq!(job.phase(), JobPhase::Failed);

        job.begin(ExportOptions::default()).unwrap();
        let snap = job.snapshot();
        assert_eq!(snap.phase, JobPhase::Running);
        assert!(snap.error.is_none());
        assert_eq!(snap.progress, 0);
    }

    #[test]
    fn progress_never_decreases() {
        let mut job = ExportJob::new();
        job.begin(ExportOptions::default()).unwrap();

        job.apply(&status(true, 30, "fetching", None));
        assert_eq!(job.snapshot().progress, 30);

        // Regressing update is clamped, not applied.
        job.apply(&status(true, 10, "still fetching", None));
        assert_eq!(job.snapshot().progress, 30);

        job.apply(&status(true, 80, "writing", None));
        assert_eq!(job.snapshot().progress, 80);
    }

    #[test]
    fn progress_above_hundred_is_clamped() {
        let mut job = ExportJob::new();
        job.begin(ExportOptions::default()).unwrap();
        job.apply(&status(true, 400, "overshoot", None));
        assert_eq!(job.snapshot().progress, 100);
    }

    #[test]
    fn terminal_success_update() {
        let mut job = ExportJob::new();
        job.begin(ExportOptions::default()).unwrap();
        job.apply(&status(false, 100, "Export completed successfully!", None));

        let snap = job.snapshot();
        assert_eq!(snap.phase, JobPhase::Completed);
        assert_eq!(snap.progress, 100);
        assert!(snap.error.is_none());
    }

    #[test]
    fn terminal_failure_update_carries_error() {
        let mut job = ExportJob::new();
        job.begin(ExportOptions::default()).unwrap();
        job.apply(&status(false, 30, "Export failed: no session", Some("no session")));

        let snap = job.snapshot();
        assert_eq!(snap.phase, JobPhase::Failed);
        assert_eq!(snap.error.as_deref(), Some("no session"));
    }

    #[test]
    fn updates_after_terminal_are_ignored() {
        let mut job = ExportJob::new();
        job.begin(ExportOptions::default()).unwrap();
        job.apply(&status(false, 100, "done", None));
        let terminal = job.snapshot();

        // A late non-terminal update must not resurrect the run.
        job.apply(&status(true, 10, "zombie update", None));
        assert_eq!(job.snapshot(), terminal);

        // Nor may a late failure rewrite the outcome.
        job.apply(&status(false, 100, "late failure", Some("nope")));
        assert_eq!(job.snapshot(), terminal);
    }

    #[test]
    fn fail_is_terminal_and_only_applies_while_running() {
        let mut job = ExportJob::new();
        job.fail("ignored while idle");
        assert_eq!(job.phase(), JobPhase::Idle);

        job.begin(ExportOptions::default()).unwrap();
        job.fail("connection refused");
        let snap = job.snapshot();
        assert_eq!(snap.phase, JobPhase::Failed);
        assert_eq!(snap.error.as_deref(), Some("connection refused"));
        assert_eq!(snap.message, "Export failed: connection refused");
    }

    #[test]
    fn empty_status_message_keeps_previous() {
        let mut job = ExportJob::new();
        job.begin(ExportOptions::default()).unwrap();
        job.apply(&status(true, 20, "connecting", None));
        job.apply(&status(true, 25, "", None));
        assert_eq!(job.snapshot().message, "connecting");
    }

    #[test]
    fn phase_display() {
        assert_eq!(JobPhase::Idle.to_string(), "idle");
        assert_eq!(JobPhase::Running.to_string(), "running");
        assert_eq!(JobPhase::Completed.to_string(), "completed");
        assert_eq!(JobPhase::Failed.to_string(), "failed");
    }
}
