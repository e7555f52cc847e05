//! Gating on how long the user has been away from the keyboard.

use chrono::{DateTime, Local};

use crate::task::{GateState, ShouldRun};

use super::ActivityMonitor;

pub fn describe_idle_gate(threshold_secs: u64) -> String {
    format!("idle > {threshold_secs}s")
}

/// Opens once per idle period: the first time idle time exceeds the
/// threshold, then stays shut until input resumes.
pub struct IdleOnce {
    activity: ActivityMonitor,
    threshold_secs: u64,
    fired: bool,
}

impl IdleOnce {
    pub fn new(activity: ActivityMonitor, threshold_secs: u64) -> Self {
        Self {
            activity,
            threshold_secs,
            fired: false,
        }
    }

    /// True on the first call of each idle period that passes the threshold.
    pub fn check(&mut self) -> bool {
        let idle = self.activity.idle_seconds();
        if idle <= self.threshold_secs as f64 {
            self.fired = false;
            return false;
        }
        if self.fired {
            return false;
        }
        tracing::debug!(idle_secs = idle, threshold_secs = self.threshold_secs, "idle run");
        self.fired = true;
        true
    }
}

impl ShouldRun for IdleOnce {
    fn should_run(&mut self, _state: &GateState, _now: DateTime<Local>) -> bool {
        self.check()
    }

    fn describe(&self) -> String {
        describe_idle_gate(self.threshold_secs)
    }
}
