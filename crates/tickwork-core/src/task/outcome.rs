use std::fmt;

use crate::error::TaskError;

/// Why a due (or candidate) task did not execute its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// An enablement precondition (e.g. connectivity) was not met.
    PreconditionUnmet,
    /// The interval had elapsed but the should-run policy declined.
    GateDeclined,
}

/// Result of offering a task one tick.
#[derive(Debug)]
pub enum Outcome {
    /// The body ran to completion.
    Ran,
    /// The interval has not elapsed, or the task has no interval.
    NotDue,
    Skipped(SkipReason),
    /// The body failed; the error has already been logged.
    Failed(TaskError),
}

impl Outcome {
    pub fn is_ran(&self) -> bool {
        matches!(self, Outcome::Ran)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// True when the body was invoked, whether it succeeded or not.
    pub fn attempted(&self) -> bool {
        matches!(self, Outcome::Ran | Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ran => write!(f, "ran"),
            Outcome::NotDue => write!(f, "not due"),
            Outcome::Skipped(SkipReason::PreconditionUnmet) => write!(f, "skipped (precondition unmet)"),
            Outcome::Skipped(SkipReason::GateDeclined) => write!(f, "skipped (gate declined)"),
            Outcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}
