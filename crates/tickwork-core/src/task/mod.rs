//! Interval-gated units of background work.
//!
//! A [`Task`] wraps a [`TaskBody`] with a label, an optional interval, an
//! enablement precondition and a should-run gate. The scheduler offers every
//! task each tick via [`Task::maybe_run`]; the task decides whether this is
//! its moment.
//!
//! ## Decision order
//!
//! ```text
//! precondition unmet  -> Skipped(PreconditionUnmet)   timestamps untouched
//! no interval / <= I  -> NotDue
//! gate declines       -> Skipped(GateDeclined)        last_run = now
//! body Ok             -> Ran                          last_run = last_task_run = now
//! body Err / panic    -> Failed(err)                  last_run = now
//! body Err(Config)    -> Err(ConfigError)             last_run = now
//! ```

mod outcome;
pub mod policy;

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use chrono::{DateTime, Duration, Local};
use tracing::Level;

use crate::error::{ConfigError, TaskError};
use crate::sink::{LogSink, TracingSink};

pub use outcome::{Outcome, SkipReason};
pub use policy::{AllOf, Always, AlwaysMet, GateState, OnPlatform, OncePerDay, Platform, Precondition, ShouldRun};

/// What a task does when it fires.
pub trait TaskBody {
    fn run(&mut self, ctx: &TaskContext<'_>) -> Result<(), TaskError>;
}

/// Handed to a body for the duration of one run.
pub struct TaskContext<'a> {
    label: &'a str,
    now: DateTime<Local>,
    sink: &'a dyn LogSink,
}

impl<'a> TaskContext<'a> {
    pub fn new(label: &'a str, now: DateTime<Local>, sink: &'a dyn LogSink) -> Self {
        Self { label, now, sink }
    }

    pub fn label(&self) -> &str {
        self.label
    }

    /// The tick time this run was started for.
    pub fn now(&self) -> DateTime<Local> {
        self.now
    }

    pub fn log(&self, text: impl AsRef<str>) {
        self.sink.write(self.label, self.now, Level::INFO, text.as_ref());
    }

    pub fn warn(&self, text: impl AsRef<str>) {
        self.sink.write(self.label, self.now, Level::WARN, text.as_ref());
    }

    pub fn error(&self, text: impl AsRef<str>) {
        self.sink.write(self.label, self.now, Level::ERROR, text.as_ref());
    }
}

/// A labelled, interval-gated task.
pub struct Task {
    label: String,
    interval: Option<Duration>,
    silent: bool,
    state: GateState,
    gate: Box<dyn ShouldRun>,
    precondition: Option<Rc<dyn Precondition>>,
    body: Box<dyn TaskBody>,
    sink: Rc<dyn LogSink>,
}

impl Task {
    /// Create a task that fires every `interval_secs` seconds.
    ///
    /// Defaults: gate [`Always`], no precondition, silent, logs to
    /// [`TracingSink`].
    pub fn new(label: impl Into<String>, interval_secs: u64, body: impl TaskBody + 'static) -> Self {
        Self::with_interval(label, Some(Duration::seconds(interval_secs as i64)), body)
    }

    /// Create a task with an explicit optional interval; `None` never fires.
    pub fn with_interval(
        label: impl Into<String>,
        interval: Option<Duration>,
        body: impl TaskBody + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            interval,
            silent: true,
            state: GateState::default(),
            gate: Box::new(Always),
            precondition: None,
            body: Box::new(body),
            sink: Rc::new(TracingSink),
        }
    }

    pub fn gate(mut self, gate: impl ShouldRun + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn boxed_gate(mut self, gate: Box<dyn ShouldRun>) -> Self {
        self.gate = gate;
        self
    }

    pub fn requires(mut self, precondition: Rc<dyn Precondition>) -> Self {
        self.precondition = Some(precondition);
        self
    }

    pub fn sink(mut self, sink: Rc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// When not silent, a "running" line is logged before every body run.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Seed the last-run timestamp (normally unset, meaning "due now").
    pub fn last_run(mut self, at: DateTime<Local>) -> Self {
        self.state.last_run = Some(at);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn describe_gate(&self) -> String {
        self.gate.describe()
    }

    pub fn precondition_name(&self) -> Option<&str> {
        self.precondition.as_deref().map(|p| p.name())
    }

    /// Whether the interval has elapsed at `now`.
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        match (self.interval, self.state.last_run) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(interval), Some(last)) => now - last > interval,
        }
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Offer the task one tick at `now`.
    ///
    /// Body failures are logged and returned as [`Outcome::Failed`]; only a
    /// configuration error escapes as `Err`.
    pub fn maybe_run(&mut self, now: DateTime<Local>) -> Result<Outcome, ConfigError> {
        if let Some(pre) = &self.precondition {
            if !pre.is_met() {
                tracing::trace!(task = %self.label, precondition = pre.name(), "precondition unmet");
                return Ok(Outcome::Skipped(SkipReason::PreconditionUnmet));
            }
        }

        if !self.is_due(now) {
            return Ok(Outcome::NotDue);
        }

        if !self.gate.should_run(&self.state, now) {
            self.state.last_run = Some(now);
            return Ok(Outcome::Skipped(SkipReason::GateDeclined));
        }

        let ctx = TaskContext::new(&self.label, now, self.sink.as_ref());
        if !self.silent {
            ctx.log(format!("Running {}", self.label.to_uppercase()));
        }

        let body = &mut self.body;
        let result = panic::catch_unwind(AssertUnwindSafe(|| body.run(&ctx)))
            .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));
        self.state.last_run = Some(now);

        match result {
            Ok(()) => {
                self.state.last_task_run = Some(now);
                Ok(Outcome::Ran)
            }
            Err(TaskError::Config(e)) => {
                ctx.error(format!("configuration error: {e}"));
                Err(e)
            }
            Err(e) => {
                ctx.error(error_chain(&e));
                Ok(Outcome::Failed(e))
            }
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("label", &self.label)
            .field("interval", &self.interval)
            .field("silent", &self.silent)
            .field("state", &self.state)
            .field("gate", &self.gate.describe())
            .field("precondition", &self.precondition_name())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    text
}
