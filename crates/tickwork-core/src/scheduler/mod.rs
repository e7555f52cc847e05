//! Single-threaded tick loop driving every registered task.
//!
//! Each tick offers every task a turn in registration order; a task's own
//! interval and gate decide whether it fires. Bodies run to completion
//! before the next task is offered its turn, so a slow body delays the whole
//! tick. The loop sleeps a full tick after every pass, so consecutive ticks
//! are always more than one tick apart and a task whose interval equals the
//! tick fires on every pass.

use std::convert::Infallible;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::ConfigError;
use crate::task::{Outcome, Task};

/// Default tick interval.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Outcomes of one tick, in registration order.
#[derive(Debug, Default)]
pub struct TickReport {
    pub at: Option<DateTime<Local>>,
    pub outcomes: Vec<(String, Outcome)>,
}

impl TickReport {
    pub fn outcome(&self, label: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, o)| o)
    }

    pub fn ran_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_ran()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failed()).count()
    }
}

/// Owns the task list and drives it forward.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Labels need not be unique, but distinct labels keep the
    /// logs legible.
    pub fn register(&mut self, task: Task) {
        if self.tasks.iter().any(|t| t.label() == task.label()) {
            tracing::warn!(task = %task.label(), "registering a second task with the same label");
        }
        self.tasks.push(task);
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Offer every task one turn at `now`.
    ///
    /// # Errors
    ///
    /// A configuration error from any body aborts the tick; tasks after it
    /// are not offered a turn.
    pub fn tick(&mut self, now: DateTime<Local>) -> Result<TickReport, ConfigError> {
        let mut report = TickReport {
            at: Some(now),
            outcomes: Vec::with_capacity(self.tasks.len()),
        };
        for task in &mut self.tasks {
            let outcome = task.maybe_run(now)?;
            if outcome.attempted() {
                tracing::debug!(task = %task.label(), %outcome, "tick");
            }
            report.outcomes.push((task.label().to_string(), outcome));
        }
        Ok(report)
    }

    /// Tick forever, sleeping `tick` after each pass. Returns only on a
    /// configuration error.
    pub fn run_forever(&mut self, tick: Duration) -> Result<Infallible, ConfigError> {
        tracing::info!(tasks = self.tasks.len(), tick_ms = tick.as_millis() as u64, "scheduler started");
        let pacer = Pacer::new(tick);
        loop {
            self.tick(Local::now())?;
            pacer.wait();
        }
    }

    /// Tick `count` times, sleeping `tick` between passes, then return.
    pub fn run_ticks(&mut self, count: u64, tick: Duration) -> Result<(), ConfigError> {
        let pacer = Pacer::new(tick);
        for i in 0..count {
            self.tick(Local::now())?;
            if i + 1 < count {
                pacer.wait();
            }
        }
        Ok(())
    }
}

/// Sleeps one full tick between passes, however long the pass took.
struct Pacer {
    tick: Duration,
}

impl Pacer {
    fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    fn wait(&self) {
        thread::sleep(self.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::task::{TaskBody, TaskContext};
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Record {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
        fail: bool,
    }

    impl TaskBody for Record {
        fn run(&mut self, _ctx: &TaskContext<'_>) -> Result<(), TaskError> {
            self.log.borrow_mut().push(self.name);
            if self.fail {
                return Err(TaskError::failed("nope"));
            }
            Ok(())
        }
    }

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2021, 10, 3, 8, 0, 0).unwrap()
    }

    #[test]
    fn tick_visits_tasks_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        for name in ["b", "a", "c"] {
            scheduler.register(Task::new(
                name,
                1,
                Record {
                    name,
                    log: log.clone(),
                    fail: false,
                },
            ));
        }

        let report = scheduler.tick(t0()).unwrap();
        assert_eq!(*log.borrow(), vec!["b", "a", "c"]);
        assert_eq!(report.ran_count(), 3);
        let labels: Vec<_> = report.outcomes.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["b", "a", "c"]);
    }

    #[test]
    fn failure_does_not_stop_the_tick() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        scheduler.register(Task::new(
            "broken",
            1,
            Record {
                name: "broken",
                log: log.clone(),
                fail: true,
            },
        ));
        scheduler.register(Task::new(
            "healthy",
            1,
            Record {
                name: "healthy",
                log: log.clone(),
                fail: false,
            },
        ));

        let report = scheduler.tick(t0()).unwrap();
        assert!(report.outcome("broken").unwrap().is_failed());
        assert!(report.outcome("healthy").unwrap().is_ran());
        assert_eq!(report.failed_count(), 1);
        assert_eq!(scheduler.tasks()[1].state().last_run, Some(t0()));
    }

    #[test]
    fn run_ticks_returns_after_count() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        scheduler.register(Task::with_interval(
            "each",
            Some(chrono::Duration::zero()),
            Record {
                name: "each",
                log: log.clone(),
                fail: false,
            },
        ));
        scheduler
            .run_ticks(3, Duration::from_millis(5))
            .unwrap();
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn interval_equal_to_tick_fires_every_pass() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        scheduler.register(Task::with_interval(
            "sampler",
            Some(chrono::Duration::milliseconds(20)),
            Record {
                name: "sampler",
                log: log.clone(),
                fail: false,
            },
        ));
        scheduler
            .run_ticks(30, Duration::from_millis(20))
            .unwrap();
        assert_eq!(log.borrow().len(), 30);
    }

    #[test]
    fn pacer_sleeps_a_full_tick() {
        let pacer = Pacer::new(Duration::from_millis(10));
        let before = std::time::Instant::now();
        pacer.wait();
        assert!(before.elapsed() >= Duration::from_millis(10));
    }
}
