use chrono::Local;
use clap::Subcommand;
use serde::Serialize;
use tickwork_core::activity::{ForegroundWindow, SystemIdle};
use tickwork_core::{ActivityMonitor, Config};

#[derive(Subcommand)]
pub enum ActivityAction {
    /// Show the current foreground window, its categories and idle time
    Current,
}

#[derive(Serialize)]
struct Current {
    descriptor: String,
    categories: Vec<String>,
    idle_secs: f64,
}

pub fn run(action: ActivityAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ActivityAction::Current => {
            let config = Config::load()?;
            let monitor =
                ActivityMonitor::new(config.activity.classifier(ForegroundWindow, SystemIdle));
            monitor.sample(Local::now());

            let descriptor = monitor
                .latest()
                .map(|s| s.descriptor)
                .unwrap_or_default();
            let current = Current {
                categories: monitor.matching_categories(&descriptor),
                idle_secs: monitor.idle_seconds(),
                descriptor,
            };
            println!("{}", serde_json::to_string_pretty(&current)?);
        }
    }
    Ok(())
}
