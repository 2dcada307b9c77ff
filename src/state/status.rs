//! Run status channel
//!
//! The coordinator owns the only `StatusReporter`; observers (a CLI progress
//! line, an HTTP poller) hold cloned `StatusHandle`s and only ever read.

use super::RunPhase;
use tokio::sync::watch;

/// Coarse progress snapshot for a polling front-end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    pub is_running: bool,
    pub phase: RunPhase,
    pub progress_percent: u8,
    pub stage_label: String,
    pub error: Option<String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            phase: RunPhase::Idle,
            progress_percent: 0,
            stage_label: RunPhase::Idle.label().to_string(),
            error: None,
        }
    }
}

/// Write side of the status channel, held by the coordinator
#[derive(Debug)]
pub struct StatusReporter {
    tx: watch::Sender<RunStatus>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunStatus::default());
        Self { tx }
    }

    /// Returns a read-only handle on the status
    pub fn handle(&self) -> StatusHandle {
        StatusHandle {
            rx: self.tx.subscribe(),
        }
    }

    /// Publishes entry into a phase
    ///
    /// Illegal transitions are logged and still published; the status
    /// channel is informational and must never stall the run.
    pub fn enter(&self, phase: RunPhase) {
        let current = self.tx.borrow().phase;
        if current != phase && !current.is_terminal() && !current.can_transition_to(phase) {
            tracing::warn!("Unexpected phase transition {} -> {}", current, phase);
        }

        self.tx.send_replace(RunStatus {
            is_running: phase.is_stage(),
            phase,
            progress_percent: phase.progress_percent(),
            stage_label: phase.label().to_string(),
            error: None,
        });
    }

    /// Publishes a run-fatal failure
    pub fn fail(&self, error: &str) {
        self.tx.send_replace(RunStatus {
            is_running: false,
            phase: RunPhase::Failed,
            progress_percent: RunPhase::Failed.progress_percent(),
            stage_label: RunPhase::Failed.label().to_string(),
            error: Some(error.to_string()),
        });
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of the status channel
#[derive(Debug, Clone)]
pub struct StatusHandle {
    rx: watch::Receiver<RunStatus>,
}

impl StatusHandle {
    /// Returns the latest status without waiting
    pub fn snapshot(&self) -> RunStatus {
        self.rx.borrow().clone()
    }

    /// Waits for the next status change
    ///
    /// Returns `None` once the reporter has been dropped.
    pub async fn changed(&mut self) -> Option<RunStatus> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
