//! User activity classification shared between tasks.
//!
//! One [`ActivityMonitor`] is built at startup and cloned into every task
//! that needs it; clones are handles to the same classifier. The monitor's
//! own sampling task is registered with the scheduler like any other task.
//!
//! The handle is `!Send`: sampling and queries are serialized by the
//! single-threaded tick loop, so no lock is taken.

mod classifier;
mod idle;
pub mod source;

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Duration, Local};

use crate::error::{ConfigError, TaskError};
use crate::task::{Task, TaskBody, TaskContext};

pub use classifier::{
    default_indicators, ActivityClassifier, ActivityIndicators, CategorySelector, Snapshot,
    ALL_CATEGORIES, DEFAULT_RETENTION_MINUTES, DEFAULT_SAMPLE_INTERVAL_SECS,
};
pub(crate) use classifier::validate_threshold;
pub use idle::{describe_idle_gate, IdleOnce};
pub use source::{ContextSource, ForegroundWindow, IdleSource, NoIdle, SystemIdle, NO_CONTEXT};

pub const ACTIVITY_TASK_LABEL: &str = "Activity";

/// Shared handle to the activity classifier.
#[derive(Clone)]
pub struct ActivityMonitor {
    inner: Rc<RefCell<ActivityClassifier>>,
}

impl ActivityMonitor {
    pub fn new(classifier: ActivityClassifier) -> Self {
        Self {
            inner: Rc::new(RefCell::new(classifier)),
        }
    }

    /// The sampling task: fires every sample interval, never needs the
    /// network, and logs nothing on success.
    pub fn task(&self) -> Task {
        let interval = self.inner.borrow().sample_interval_secs();
        Task::with_interval(
            ACTIVITY_TASK_LABEL,
            Some(Duration::seconds(interval as i64)),
            Sampler {
                monitor: self.clone(),
            },
        )
    }

    pub fn sample(&self, now: DateTime<Local>) {
        self.inner.borrow_mut().sample(now);
    }

    pub fn evaluate(
        &self,
        categories: &str,
        threshold_percent: f64,
        window_minutes: f64,
    ) -> Result<bool, ConfigError> {
        self.inner
            .borrow()
            .evaluate(categories, threshold_percent, window_minutes)
    }

    pub fn evaluate_selector(
        &self,
        selector: &CategorySelector,
        threshold_percent: f64,
        window_minutes: f64,
    ) -> Result<bool, ConfigError> {
        self.inner
            .borrow()
            .evaluate_selector(selector, threshold_percent, window_minutes)
    }

    pub fn selector(&self, categories: &str) -> Result<CategorySelector, ConfigError> {
        self.inner.borrow().selector(categories)
    }

    pub fn idle_seconds(&self) -> f64 {
        self.inner.borrow_mut().idle_seconds()
    }

    pub fn matching_categories(&self, descriptor: &str) -> Vec<String> {
        self.inner.borrow().matching_categories(descriptor)
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.inner.borrow().latest().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

struct Sampler {
    monitor: ActivityMonitor,
}

impl TaskBody for Sampler {
    fn run(&mut self, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
        self.monitor.sample(ctx.now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Fixed(&'static str);

    impl ContextSource for Fixed {
        fn current_context(&mut self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn sampling_task_feeds_shared_handle() {
        let monitor = ActivityMonitor::new(ActivityClassifier::new(Fixed("VLC media player"), NoIdle));
        let reader = monitor.clone();
        let mut task = monitor.task();
        let t0 = Local.with_ymd_and_hms(2021, 10, 3, 21, 0, 0).unwrap();

        assert_eq!(task.label(), ACTIVITY_TASK_LABEL);
        assert_eq!(task.interval(), Some(Duration::seconds(1)));

        for i in 0..5 {
            task.maybe_run(t0 + Duration::milliseconds(1001 * i)).unwrap();
        }
        assert_eq!(reader.len(), 5);
        assert!(reader.evaluate("movie", 50.0, 1.0).unwrap());
        assert_eq!(reader.latest().unwrap().descriptor, "VLC media player");
    }

    #[test]
    fn idle_seconds_delegates_to_source() {
        struct Away;
        impl IdleSource for Away {
            fn seconds_since_last_input(&mut self) -> f64 {
                900.0
            }
        }
        let monitor = ActivityMonitor::new(ActivityClassifier::new(Fixed("Desktop"), Away));
        assert_eq!(monitor.idle_seconds(), 900.0);
    }
}
