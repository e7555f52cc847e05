//! Once-a-day copy of a single file into a backup directory.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::task::{TaskBody, TaskContext};

pub const DEFAULT_BACKUP_NAME_FORMAT: &str = "%Y-%m-%d backup";

fn default_interval() -> u64 {
    3600
}
fn default_name_format() -> String {
    DEFAULT_BACKUP_NAME_FORMAT.into()
}

/// `[daemons.daily_backup]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBackupConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub platform: Option<crate::task::Platform>,
    #[serde(default)]
    pub source: PathBuf,
    #[serde(default)]
    pub destination_dir: PathBuf,
    /// `strftime` pattern for the copy's file name; the source extension is
    /// appended.
    #[serde(default = "default_name_format")]
    pub name_format: String,
}

impl Default for DailyBackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval(),
            platform: None,
            source: PathBuf::new(),
            destination_dir: PathBuf::new(),
            name_format: default_name_format(),
        }
    }
}

/// Copies `source` into `destination_dir`. Pair with the `OncePerDay` gate.
pub struct DailyBackup {
    source: PathBuf,
    destination_dir: PathBuf,
    name_format: String,
}

impl DailyBackup {
    pub fn new(source: impl Into<PathBuf>, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination_dir: destination_dir.into(),
            name_format: default_name_format(),
        }
    }

    pub fn name_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = format.into();
        self
    }

    fn target_name(&self, ctx: &TaskContext<'_>) -> String {
        let stem = ctx.now().format(&self.name_format).to_string();
        match self.source.extension() {
            Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
            None => stem,
        }
    }
}

impl TaskBody for DailyBackup {
    fn run(&mut self, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
        if !self.source.is_file() {
            return Err(TaskError::failed(format!(
                "backup source {} does not exist",
                self.source.display()
            )));
        }

        let target = self.destination_dir.join(self.target_name(ctx));
        if target.exists() {
            tracing::debug!(path = %target.display(), "backup already present");
            return Ok(());
        }

        fs::create_dir_all(&self.destination_dir)?;
        let bytes = fs::copy(&self.source, &target)?;
        ctx.log(format!("Backed up {} ({bytes} bytes)", target.display()));
        Ok(())
    }
}
