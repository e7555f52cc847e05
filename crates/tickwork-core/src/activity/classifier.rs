//! Rolling buffer of foreground snapshots and the dominance query over it.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::source::{ContextSource, IdleSource};
use crate::error::ConfigError;

/// Selector keyword matching every known category.
pub const ALL_CATEGORIES: &str = "all";

pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_RETENTION_MINUTES: u64 = 20;

/// Category name -> window-title substrings that indicate it.
pub type ActivityIndicators = BTreeMap<String, Vec<String>>;

pub fn default_indicators() -> ActivityIndicators {
    let mut map = ActivityIndicators::new();
    map.insert("movie".into(), vec!["MPC".into(), "VLC media player".into()]);
    map.insert("coding".into(), vec![".py".into(), "Visual Studio Code".into()]);
    map.insert("gaming".into(), vec!["Minecraft".into()]);
    map
}

/// One sampled observation of the foreground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub at: DateTime<Local>,
    pub descriptor: String,
}

/// A resolved set of indicator strings for one or more categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySelector {
    spec: String,
    patterns: Vec<String>,
}

impl CategorySelector {
    /// Resolve `"all"` or a comma-separated list of category names.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownCategory`] for a name with no indicators.
    pub fn parse(indicators: &ActivityIndicators, spec: &str) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        let patterns = if spec == ALL_CATEGORIES {
            indicators.values().flatten().cloned().collect()
        } else {
            let mut patterns = Vec::new();
            for name in spec.split(',').map(str::trim) {
                let found = indicators
                    .get(name)
                    .ok_or_else(|| ConfigError::UnknownCategory(name.to_string()))?;
                patterns.extend(found.iter().cloned());
            }
            patterns
        };
        Ok(Self {
            spec: spec.to_string(),
            patterns,
        })
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Case-sensitive substring match against any indicator.
    pub fn matches(&self, descriptor: &str) -> bool {
        self.patterns.iter().any(|p| descriptor.contains(p.as_str()))
    }
}

/// Bounded history of what the user has had in the foreground.
pub struct ActivityClassifier {
    indicators: ActivityIndicators,
    sample_interval_secs: u64,
    capacity: usize,
    samples: VecDeque<Snapshot>,
    source: Box<dyn ContextSource>,
    idle: Box<dyn IdleSource>,
}

impl ActivityClassifier {
    /// Classifier with the default indicators, 1 s sampling and a 20 minute
    /// retention window.
    pub fn new(source: impl ContextSource + 'static, idle: impl IdleSource + 'static) -> Self {
        let mut classifier = Self {
            indicators: default_indicators(),
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            capacity: 0,
            samples: VecDeque::new(),
            source: Box::new(source),
            idle: Box::new(idle),
        };
        classifier.set_sampling(DEFAULT_SAMPLE_INTERVAL_SECS, DEFAULT_RETENTION_MINUTES * 60);
        classifier
    }

    pub fn with_indicators(mut self, indicators: ActivityIndicators) -> Self {
        self.indicators = indicators;
        self
    }

    /// Set the sampling cadence and how much history is retained.
    pub fn with_sampling(mut self, sample_interval_secs: u64, retention_secs: u64) -> Self {
        self.set_sampling(sample_interval_secs, retention_secs);
        self
    }

    fn set_sampling(&mut self, sample_interval_secs: u64, retention_secs: u64) {
        self.sample_interval_secs = sample_interval_secs.max(1);
        self.capacity = ((retention_secs / self.sample_interval_secs) as usize).max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn indicators(&self) -> &ActivityIndicators {
        &self.indicators
    }

    pub fn sample_interval_secs(&self) -> u64 {
        self.sample_interval_secs
    }

    /// Maximum number of retained snapshots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.samples.back()
    }

    pub fn selector(&self, categories: &str) -> Result<CategorySelector, ConfigError> {
        CategorySelector::parse(&self.indicators, categories)
    }

    /// Categories whose indicators appear in `descriptor`.
    pub fn matching_categories(&self, descriptor: &str) -> Vec<String> {
        self.indicators
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|p| descriptor.contains(p.as_str())))
            .map(|(name, _)| name.clone())
            .collect()
    }

    // ── Sampling ─────────────────────────────────────────────────────

    /// Append one snapshot from the context source, then drop the oldest
    /// entries beyond capacity.
    pub fn sample(&mut self, now: DateTime<Local>) {
        let descriptor = self.source.current_context();
        self.samples.push_back(Snapshot { at: now, descriptor });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn idle_seconds(&mut self) -> f64 {
        self.idle.seconds_since_last_input()
    }

    // ── Evaluation ───────────────────────────────────────────────────

    /// Whether `categories` dominated the last `window_minutes`.
    ///
    /// Counts matching snapshots among the most recent
    /// `window_minutes * 60 / sample_interval` and compares against
    /// `threshold_percent` of the *whole* buffer.
    ///
    /// # Errors
    ///
    /// Unknown category names and thresholds outside `(0, 100]`.
    pub fn evaluate(
        &self,
        categories: &str,
        threshold_percent: f64,
        window_minutes: f64,
    ) -> Result<bool, ConfigError> {
        let selector = self.selector(categories)?;
        self.evaluate_selector(&selector, threshold_percent, window_minutes)
    }

    /// [`evaluate`](Self::evaluate) with a pre-resolved selector.
    pub fn evaluate_selector(
        &self,
        selector: &CategorySelector,
        threshold_percent: f64,
        window_minutes: f64,
    ) -> Result<bool, ConfigError> {
        validate_threshold(threshold_percent)?;
        if !(window_minutes >= 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "window_minutes".into(),
                message: format!("must be non-negative, got {window_minutes}"),
            });
        }

        let window = (window_minutes * 60.0 / self.sample_interval_secs as f64) as usize;
        let skip = self.samples.len().saturating_sub(window);
        let hits = self
            .samples
            .iter()
            .skip(skip)
            .filter(|s| selector.matches(&s.descriptor))
            .count();

        Ok(hits as f64 > self.samples.len() as f64 * (threshold_percent / 100.0))
    }
}

pub(crate) fn validate_threshold(threshold_percent: f64) -> Result<(), ConfigError> {
    if threshold_percent > 0.0 && threshold_percent <= 100.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: "threshold_percent".into(),
            message: format!("must be in (0, 100], got {threshold_percent}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::source::NoIdle;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Replays a queue of titles; repeats the last one when exhausted.
    #[derive(Clone, Default)]
    struct Script(Rc<RefCell<VecDeque<String>>>);

    impl Script {
        fn push(&self, title: &str, times: usize) {
            let mut q = self.0.borrow_mut();
            for _ in 0..times {
                q.push_back(title.to_string());
            }
        }
    }

    impl ContextSource for Script {
        fn current_context(&mut self) -> String {
            self.0.borrow_mut().pop_front().unwrap_or_else(|| "Desktop".into())
        }
    }

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2021, 10, 3, 20, 0, 0).unwrap()
    }

    fn drain(classifier: &mut ActivityClassifier, n: usize) {
        for i in 0..n {
            classifier.sample(t0() + Duration::seconds(i as i64));
        }
    }

    #[test]
    fn full_buffer_denominator_example() {
        let script = Script::default();
        // 1200 samples, the 3 movie frames fall inside the last 10 minutes.
        script.push("Terminal", 1000);
        script.push("movie.mkv - VLC media player", 3);
        script.push("Terminal", 197);

        let mut classifier = ActivityClassifier::new(script, NoIdle);
        drain(&mut classifier, 1200);
        assert_eq!(classifier.len(), 1200);

        // 3 > 1200 * 0.02 = 24 is false.
        assert!(!classifier.evaluate("movie", 2.0, 10.0).unwrap());
    }

    #[test]
    fn dominant_category_is_detected() {
        let script = Script::default();
        script.push("Terminal", 10);
        script.push("Film - MPC-HC", 50);

        let mut classifier = ActivityClassifier::new(script, NoIdle);
        drain(&mut classifier, 60);

        // 50 hits > 60 * 0.5
        assert!(classifier.evaluate("movie", 50.0, 1.0).unwrap());
        assert!(!classifier.evaluate("gaming", 1.0, 1.0).unwrap());
        assert!(classifier.evaluate("gaming,movie", 50.0, 1.0).unwrap());
        assert!(classifier.evaluate("all", 50.0, 1.0).unwrap());
    }

    #[test]
    fn window_restricts_counted_samples() {
        let script = Script::default();
        script.push("Minecraft", 30);
        script.push("Terminal", 30);

        let mut classifier = ActivityClassifier::new(script, NoIdle);
        drain(&mut classifier, 60);

        // Gaming only happened more than 30 s ago.
        assert!(!classifier.evaluate("gaming", 1.0, 0.5).unwrap());
        assert!(classifier.evaluate("gaming", 1.0, 1.0).unwrap());
    }

    #[test]
    fn unknown_category_is_a_configuration_error() {
        let classifier = ActivityClassifier::new(Script::default(), NoIdle);
        let err = classifier.evaluate("movie,cooking", 10.0, 5.0).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCategory(ref c) if c == "cooking"));
    }

    #[test]
    fn threshold_outside_range_is_rejected() {
        let classifier = ActivityClassifier::new(Script::default(), NoIdle);
        assert!(classifier.evaluate("movie", 0.0, 5.0).is_err());
        assert!(classifier.evaluate("movie", 100.5, 5.0).is_err());
        assert!(classifier.evaluate("movie", 100.0, 5.0).is_ok());
    }

    #[test]
    fn empty_buffer_never_dominates() {
        let classifier = ActivityClassifier::new(Script::default(), NoIdle);
        assert!(!classifier.evaluate("all", 0.1, 20.0).unwrap());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let classifier = ActivityClassifier::new(Script::default(), NoIdle);
        assert_eq!(classifier.matching_categories("main.py - Visual Studio Code"), vec!["coding"]);
        assert!(classifier.matching_categories("vlc media player").is_empty());
    }

    #[test]
    fn selector_trims_names() {
        let selector = CategorySelector::parse(&default_indicators(), " movie , gaming ").unwrap();
        assert!(selector.matches("Minecraft 1.17"));
        assert!(selector.matches("VLC media player"));
        assert!(!selector.matches("Visual Studio Code"));
    }

    #[test]
    fn shrinking_retention_truncates_existing_samples() {
        let mut classifier = ActivityClassifier::new(Script::default(), NoIdle);
        drain(&mut classifier, 100);
        let classifier = classifier.with_sampling(1, 30);
        assert_eq!(classifier.len(), 30);
    }

    proptest! {
        #[test]
        fn buffer_never_exceeds_capacity(
            interval in 1u64..10,
            retention in 1u64..600,
            samples in 0usize..400,
        ) {
            let mut classifier =
                ActivityClassifier::new(Script::default(), NoIdle).with_sampling(interval, retention);
            let capacity = ((retention / interval) as usize).max(1);
            for i in 0..samples {
                classifier.sample(t0() + Duration::seconds(i as i64));
                prop_assert!(classifier.len() <= capacity);
            }
            prop_assert_eq!(classifier.capacity(), capacity);
        }
    }
}
