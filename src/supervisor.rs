//! Worker process supervision.
//!
//! The backend announces readiness only through its startup log, so the
//! supervisor spawns the process with piped stdio, forwards every output line
//! to the log, and scans stdout for the configured readiness phrases under a
//! deadline. Exits are observed by a dedicated watcher task that owns the
//! child; [`Supervisor::terminate`] only signals that task, which makes it
//! idempotent and safe to call from racing shutdown paths.
//!
//! State transitions are committed under one lock and the first writer wins:
//! an exit recorded before a readiness match is never overridden by it, and
//! vice versa.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

use crate::export::ReadinessProbe;

/// Lifecycle state of the supervised worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    NotStarted,
    Starting,
    Ready,
    Exited(Option<i32>),
    Failed(String),
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::NotStarted => write!(f, "not started"),
            WorkerState::Starting => write!(f, "starting"),
            WorkerState::Ready => write!(f, "ready"),
            WorkerState::Exited(Some(code)) => write!(f, "exited (code {code})"),
            WorkerState::Exited(None) => write!(f, "exited (killed)"),
            WorkerState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

fn code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    #[error("worker did not signal readiness within {0:?}")]
    ReadinessTimeout(Duration),

    #[error("worker exited before readiness (exit code {})", code_label(.code))]
    PrematureExit { code: Option<i32> },

    #[error("a worker is already active")]
    WorkerActive,

    #[error("readiness patterns must not be empty")]
    NoReadinessPatterns,
}

/// Everything needed to start one worker.
#[derive(Debug, Clone)]
pub struct StartSpec {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub readiness_patterns: Vec<String>,
    pub timeout: Duration,
}

struct WorkerSlot {
    state: WorkerState,
    started_at: Option<DateTime<Utc>>,
    /// True from spawn until the watcher task has reaped the child.
    live: bool,
    kill_tx: Option<oneshot::Sender<()>>,
}

struct Shared {
    slot: Mutex<WorkerSlot>,
    /// Bumped on every state transition; wakes readiness/exit waiters.
    changed: watch::Sender<()>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WorkerSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Readiness observed on stdout. Honored only while still starting.
    fn mark_ready(&self) {
        {
            let mut slot = self.lock();
            if slot.state == WorkerState::Starting {
                slot.state = WorkerState::Ready;
                info!("worker signaled readiness");
            }
        }
        let _ = self.changed.send(());
    }

    /// The watcher reaped the child. A kill-initiated exit completes the
    /// teardown and frees the slot for a restart.
    fn mark_exited(&self, code: Option<i32>, killed: bool) {
        {
            let mut slot = self.lock();
            slot.live = false;
            slot.kill_tx = None;
            if killed {
                info!("worker terminated");
                slot.state = WorkerState::NotStarted;
            } else {
                warn!(code = ?code, "worker exited");
                slot.state = WorkerState::Exited(code);
            }
        }
        let _ = self.changed.send(());
    }
}

/// Owns the lifecycle of the one external worker process.
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl Supervisor {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(());
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(WorkerSlot {
                    state: WorkerState::NotStarted,
                    started_at: None,
                    live: false,
                    kill_tx: None,
                }),
                changed,
            }),
        }
    }

    /// Starts the worker and waits until it signals readiness.
    ///
    /// Resolves `Ok` the first time any stdout line contains one of the
    /// readiness patterns. Fails with [`SupervisorError::Spawn`] when the OS
    /// refuses the process, [`SupervisorError::PrematureExit`] when the
    /// worker dies first, and [`SupervisorError::ReadinessTimeout`] when the
    /// deadline passes. After a timeout the process is left running and must
    /// be reaped with [`terminate`](Supervisor::terminate).
    pub async fn start(&self, spec: StartSpec) -> Result<(), SupervisorError> {
        if spec.readiness_patterns.is_empty() {
            return Err(SupervisorError::NoReadinessPatterns);
        }

        // Subscribe before any transition can happen so none is missed.
        let mut changed_rx = self.shared.changed.subscribe();

        {
            let mut slot = self.shared.lock();
            if slot.live || matches!(slot.state, WorkerState::Starting | WorkerState::Ready) {
                return Err(SupervisorError::WorkerActive);
            }
            slot.state = WorkerState::Starting;
            slot.started_at = Some(Utc::now());
        }

        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.shared.lock().state = WorkerState::Failed(format!("spawn failed: {err}"));
                return Err(SupervisorError::Spawn(err.to_string()));
            }
        };

        info!(pid = ?child.id(), command = %spec.command, "worker spawned");

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.start_kill();
                self.shared.lock().state = WorkerState::Failed("worker stdio unavailable".into());
                return Err(SupervisorError::Spawn("worker stdio unavailable".into()));
            }
        };

        let (kill_tx, kill_rx) = oneshot::channel();
        {
            let mut slot = self.shared.lock();
            slot.live = true;
            slot.kill_tx = Some(kill_tx);
        }

        // Forward stderr until EOF. Diagnostic visibility does not depend on
        // the readiness outcome.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "backend::stderr", "{line}");
            }
        });

        // Forward stdout until EOF, scanning for readiness until matched.
        let shared = Arc::clone(&self.shared);
        let patterns = spec.readiness_patterns.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut scanning = true;
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target: "backend::stdout", "{line}");
                if scanning && patterns.iter().any(|p| line.contains(p.as_str())) {
                    scanning = false;
                    shared.mark_ready();
                }
            }
        });

        // The watcher owns the child: it reaps natural exits and executes
        // kill requests from terminate().
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let waited = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };
            let (status, killed) = match waited {
                Some(status) => (status, false),
                None => {
                    let _ = child.start_kill();
                    (child.wait().await, true)
                }
            };
            let code = status.ok().and_then(|s| s.code());
            shared.mark_exited(code, killed);
        });

        // Wait for the first committed decision: readiness, exit, or deadline.
        let deadline = tokio::time::sleep(spec.timeout);
        tokio::pin!(deadline);
        loop {
            match self.shared.lock().state.clone() {
                WorkerState::Ready => return Ok(()),
                WorkerState::Exited(code) => {
                    return Err(SupervisorError::PrematureExit { code });
                }
                // terminate() raced the startup; the worker is gone.
                WorkerState::NotStarted => {
                    return Err(SupervisorError::PrematureExit { code: None });
                }
                WorkerState::Starting | WorkerState::Failed(_) => {}
            }

            tokio::select! {
                _ = changed_rx.changed() => {}
                _ = &mut deadline => {
                    let mut slot = self.shared.lock();
                    match slot.state.clone() {
                        WorkerState::Ready => return Ok(()),
                        WorkerState::Exited(code) => {
                            return Err(SupervisorError::PrematureExit { code });
                        }
                        _ => {
                            slot.state = WorkerState::Failed("readiness timeout".into());
                            return Err(SupervisorError::ReadinessTimeout(spec.timeout));
                        }
                    }
                }
            }
        }
    }

    /// Sends the kill signal to the tracked worker, if any.
    ///
    /// Idempotent and safe under concurrent invocation: the signal is
    /// delivered at most once, and calling with no worker (or an already
    /// exited one) is a no-op.
    pub fn terminate(&self) {
        let kill_tx = self.shared.lock().kill_tx.take();
        if let Some(tx) = kill_tx {
            info!("terminating worker");
            let _ = tx.send(());
        }
    }

    /// Current worker state snapshot.
    pub fn state(&self) -> WorkerState {
        self.shared.lock().state.clone()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.shared.lock().started_at
    }

    /// Waits until no live worker remains (already true for a fresh
    /// supervisor). Useful after [`terminate`](Supervisor::terminate) to
    /// confirm the reap.
    pub async fn wait_for_exit(&self) {
        let mut changed_rx = self.shared.changed.subscribe();
        loop {
            if !self.shared.lock().live {
                return;
            }
            if changed_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessProbe for Supervisor {
    fn is_ready(&self) -> bool {
        self.shared.lock().state == WorkerState::Ready
    }
}
