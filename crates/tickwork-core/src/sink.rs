//! Task-attributed log sinks.
//!
//! Every line a task writes carries the task label, a local timestamp and a
//! level. Sinks are append-only; a sink that cannot write reports it through
//! `tracing` and carries on.

use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Local};
use tracing::Level;

/// Destination for task log lines.
pub trait LogSink {
    fn write(&self, label: &str, at: DateTime<Local>, level: Level, text: &str);
}

/// Forwards lines to the `tracing` subscriber installed by the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, label: &str, _at: DateTime<Local>, level: Level, text: &str) {
        let task = label.to_uppercase();
        match level {
            Level::ERROR => tracing::error!(task = %task, "{text}"),
            Level::WARN => tracing::warn!(task = %task, "{text}"),
            Level::INFO => tracing::info!(task = %task, "{text}"),
            Level::DEBUG => tracing::debug!(task = %task, "{text}"),
            _ => tracing::trace!(task = %task, "{text}"),
        }
    }
}

/// One text file per label per day:
/// `<root>/<YYYY-MM-DD>/<LABEL> <YYYY-MM-DD>.txt`, lines `HH:MM:SS\t<text>`.
#[derive(Debug, Clone)]
pub struct DailyFileSink {
    root: PathBuf,
}

impl DailyFileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file a line for `label` written at `at` lands in.
    pub fn path_for(&self, label: &str, at: DateTime<Local>) -> PathBuf {
        let day = at.format("%Y-%m-%d").to_string();
        self.root
            .join(&day)
            .join(format!("{} {}.txt", label.to_uppercase(), day))
    }

    fn append(&self, label: &str, at: DateTime<Local>, text: &str) -> std::io::Result<()> {
        let path = self.path_for(label, at);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}\t{}", at.format("%H:%M:%S"), text)
    }
}

impl LogSink for DailyFileSink {
    fn write(&self, label: &str, at: DateTime<Local>, _level: Level, text: &str) {
        if let Err(e) = self.append(label, at, text) {
            tracing::warn!(task = %label, root = %self.root.display(), "failed to append log line: {e}");
        }
    }
}

/// Writes every line to each inner sink, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn LogSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl LogSink for FanoutSink {
    fn write(&self, label: &str, at: DateTime<Local>, level: Level, text: &str) {
        for sink in &self.sinks {
            sink.write(label, at, level, text);
        }
    }
}

/// A line captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub label: String,
    pub at: DateTime<Local>,
    pub level: Level,
    pub text: String,
}

/// Keeps lines in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Rc<RefCell<Vec<LogLine>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.borrow().clone()
    }

    /// Texts written under `label`, oldest first.
    pub fn texts_for(&self, label: &str) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|l| l.label == label)
            .map(|l| l.text.clone())
            .collect()
    }
}

impl LogSink for MemorySink {
    fn write(&self, label: &str, at: DateTime<Local>, level: Level, text: &str) {
        self.lines.borrow_mut().push(LogLine {
            label: label.to_string(),
            at,
            level,
            text: text.to_string(),
        });
    }
}
