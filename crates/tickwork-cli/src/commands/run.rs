use std::time::Duration;

use clap::Args;
use tickwork_core::activity::ACTIVITY_TASK_LABEL;
use tickwork_core::daemons::{self, Services};
use tickwork_core::{Config, Scheduler};

#[derive(Args)]
pub struct RunArgs {
    /// Seconds between ticks (defaults to `tick_secs` from the config)
    #[arg(long)]
    tick: Option<u64>,
    /// Stop after this many ticks instead of running forever
    #[arg(long)]
    ticks: Option<u64>,
    /// Only run the named tasks (activity sampling always runs)
    #[arg(long = "only", value_name = "LABEL")]
    only: Vec<String>,
}

fn selected(only: &[String], label: &str) -> bool {
    label == ACTIVITY_TASK_LABEL || only.is_empty() || only.iter().any(|l| l.eq_ignore_ascii_case(label))
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let services = Services::from_config(&config)?;
    let tasks = daemons::build_tasks(&config, &services)?;

    for wanted in &args.only {
        if !tasks.iter().any(|t| t.label().eq_ignore_ascii_case(wanted)) {
            return Err(format!("no enabled task named '{wanted}'").into());
        }
    }

    let mut scheduler = Scheduler::new();
    for task in tasks {
        if selected(&args.only, task.label()) {
            scheduler.register(task);
        }
    }

    let tick_secs = args.tick.unwrap_or(config.tick_secs);
    if tick_secs == 0 {
        return Err("--tick must be greater than zero".into());
    }
    let tick = Duration::from_secs(tick_secs);

    match args.ticks {
        Some(count) => {
            scheduler.run_ticks(count, tick)?;
            tracing::info!(ticks = count, "finished");
        }
        None => match scheduler.run_forever(tick)? {},
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_is_always_selected() {
        let only = vec!["vpn".to_string()];
        assert!(selected(&only, ACTIVITY_TASK_LABEL));
        assert!(selected(&only, "VPN"));
        assert!(!selected(&only, "Dict.cc"));
        assert!(selected(&[], "Dict.cc"));
    }
}
