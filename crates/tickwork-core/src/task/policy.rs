//! Policy points of a task: the should-run gate and enablement preconditions.
//!
//! Both are small strategy objects handed to [`Task`](super::Task) at
//! construction. Gates see the task's timestamps; preconditions see nothing
//! but the outside world.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Timestamps a gate may consult.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateState {
    /// Last tick in which a firing decision was made.
    pub last_run: Option<DateTime<Local>>,
    /// Last successful body completion.
    pub last_task_run: Option<DateTime<Local>>,
}

/// Decides whether a due task actually executes this tick.
pub trait ShouldRun {
    fn should_run(&mut self, state: &GateState, now: DateTime<Local>) -> bool;

    /// Short name used when listing tasks.
    fn describe(&self) -> String;
}

/// Always eligible. The default gate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Always;

impl ShouldRun for Always {
    fn should_run(&mut self, _state: &GateState, _now: DateTime<Local>) -> bool {
        true
    }

    fn describe(&self) -> String {
        "always".into()
    }
}

/// True at most once per local calendar date, keyed on `last_task_run`.
///
/// A failed body leaves `last_task_run` untouched, so the task stays
/// eligible for the rest of the day.
#[derive(Debug, Default, Clone, Copy)]
pub struct OncePerDay;

impl ShouldRun for OncePerDay {
    fn should_run(&mut self, state: &GateState, now: DateTime<Local>) -> bool {
        match state.last_task_run {
            Some(last) => last.date_naive() != now.date_naive(),
            None => true,
        }
    }

    fn describe(&self) -> String {
        "daily".into()
    }
}

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    Mac,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }
}

/// Only eligible on the given platform.
#[derive(Debug, Clone, Copy)]
pub struct OnPlatform(pub Platform);

impl ShouldRun for OnPlatform {
    fn should_run(&mut self, _state: &GateState, _now: DateTime<Local>) -> bool {
        Platform::current() == self.0
    }

    fn describe(&self) -> String {
        format!("on {:?}", self.0).to_lowercase()
    }
}

/// Conjunction of gates. Evaluation stops at the first refusal.
#[derive(Default)]
pub struct AllOf(Vec<Box<dyn ShouldRun>>);

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, gate: impl ShouldRun + 'static) -> Self {
        self.0.push(Box::new(gate));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ShouldRun for AllOf {
    fn should_run(&mut self, state: &GateState, now: DateTime<Local>) -> bool {
        self.0.iter_mut().all(|g| g.should_run(state, now))
    }

    fn describe(&self) -> String {
        if self.0.is_empty() {
            return Always.describe();
        }
        self.0.iter().map(|g| g.describe()).collect::<Vec<_>>().join(" + ")
    }
}

/// Condition that must hold before a task is even considered.
///
/// An unmet precondition leaves the task's timestamps untouched.
pub trait Precondition {
    fn name(&self) -> &str;
    fn is_met(&self) -> bool;
}

/// A precondition that always holds.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysMet;

impl Precondition for AlwaysMet {
    fn name(&self) -> &str {
        "none"
    }

    fn is_met(&self) -> bool {
        true
    }
}
