//! Run status and failure kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a run ended in the failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A generator call failed.
    Generation,
    /// A validator call failed or returned an unusable decision.
    Validation,
    /// The caller cancelled the run between stages.
    Cancelled,
    /// The caller's deadline passed between stages.
    DeadlineExceeded,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generation => write!(f, "generation"),
            Self::Validation => write!(f, "validation"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline_exceeded"),
        }
    }
}

/// The state of a pipeline run.
///
/// `NotStarted → Running(i) → {Running(i+1) | Halted | Failed | Completed}`.
/// The last three are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// No stage has started.
    #[default]
    NotStarted,
    /// The stage at `stage_index` is executing.
    Running {
        /// Zero-based index of the running stage.
        stage_index: usize,
    },
    /// Every stage ran and every gate passed.
    Completed,
    /// A gate rejected the output of `stage`.
    Halted {
        /// Name of the halting stage.
        stage: String,
    },
    /// A collaborator failed or the caller stopped the run.
    Failed {
        /// Stage that was executing, if the failure happened inside one.
        stage: Option<String>,
        /// Failure category.
        kind: FailureKind,
        /// Human-readable reason.
        reason: String,
    },
}

impl RunStatus {
    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Halted { .. } | Self::Failed { .. })
    }

    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if a gate halted the run.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }

    /// Returns true if the run failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running { stage_index } => write!(f, "running:{stage_index}"),
            Self::Completed => write!(f, "completed"),
            Self::Halted { stage } => write!(f, "halted_at_stage:{stage}"),
            Self::Failed { reason, .. } => write!(f, "failed:{reason}"),
        }
    }
}
