//! # tickwork Core Library
//!
//! A single-process host for small periodic background jobs ("daemons").
//! The `tickwork` CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Scheduler**: a cooperative, single-threaded tick loop. Every tick
//!   offers each registered task the chance to run, in registration order.
//! - **Task**: interval + eligibility gate + optional precondition around a
//!   body. Body failures are logged and contained; configuration mistakes
//!   propagate.
//! - **Activity**: samples the foreground window into a rolling buffer and
//!   answers "was the user mostly doing X lately?". One classifier is shared
//!   by all tasks that ask.
//! - **Daemons**: the bundled task bodies and the factory that builds them
//!   from [`Config`].
//!
//! ## Key Components
//!
//! - [`Scheduler`]: drives the tick loop
//! - [`Task`]: the unit of scheduling
//! - [`ActivityMonitor`]: shared handle to the activity classifier
//! - [`Config`]: TOML configuration

pub mod activity;
pub mod daemons;
pub mod error;
pub mod net;
pub mod scheduler;
pub mod sink;
pub mod storage;
pub mod task;

pub use activity::{ActivityClassifier, ActivityMonitor, CategorySelector};
pub use error::{ConfigError, CoreError, TaskError};
pub use scheduler::{Scheduler, TickReport};
pub use sink::{DailyFileSink, LogSink, MemorySink, TracingSink};
pub use storage::{data_dir, Config};
pub use task::{Outcome, SkipReason, Task, TaskBody, TaskContext};
