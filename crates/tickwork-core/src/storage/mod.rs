mod config;

pub use config::{
    ActivityConfig, Config, ConnectivityConfig, DaemonsConfig, HttpConfig, LoggingConfig,
};

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns the tickwork data directory, creating it if needed.
///
/// `$TICKWORK_HOME` wins when set. Otherwise `~/.config/tickwork`, or
/// `~/.config/tickwork-dev` when `TICKWORK_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let dir = match std::env::var_os("TICKWORK_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("TICKWORK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("tickwork-dev")
            } else {
                base_dir.join("tickwork")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
