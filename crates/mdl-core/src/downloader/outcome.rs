use std::io;
use std::path::PathBuf;

use crate::connectivity::GateError;
use crate::destination::DestinationError;
use crate::storage::StoreError;

/// Orchestrator states. Terminal states are `Done`, `Skipped` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Negotiating,
    Transferring,
    AwaitingConnectivity,
    Finalizing,
    Done,
    Skipped,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Skipped | JobState::Failed)
    }
}

/// Why a job ended in `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    #[error("gave up after {attempts} attempts; last response was HTTP {status}")]
    RetriesExhausted { status: u16, attempts: u32 },
    #[error("network unreachable and waiting was declined")]
    ConnectivityAbandoned,
    #[error("request failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Destination(#[from] DestinationError),
    /// Sidecar I/O, size mismatch, decode, checksum or rename failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("writing sidecar failed: {0}")]
    Write(#[source] io::Error),
    #[error("job aborted by user")]
    Cancelled,
}

impl From<GateError> for FailureReason {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Abandoned => FailureReason::ConnectivityAbandoned,
            GateError::Aborted(_) => FailureReason::Cancelled,
        }
    }
}

/// Terminal result of `Downloader::run`.
#[derive(Debug)]
pub enum JobOutcome {
    /// Final artifact in place; `bytes` is its size on disk.
    Done { path: PathBuf, bytes: u64 },
    /// Final artifact already existed and skip-existing was set.
    Skipped { path: PathBuf },
    /// `partial` names the sidecar when one was left behind for a later resume.
    Failed {
        reason: FailureReason,
        partial: Option<PathBuf>,
    },
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Done { .. } => JobState::Done,
            JobOutcome::Skipped { .. } => JobState::Skipped,
            JobOutcome::Failed { .. } => JobState::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, JobOutcome::Done { .. })
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            JobOutcome::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
