//! The daemons that ship with tickwork, and the factory that turns a
//! [`Config`] into a ready-to-register task list.

mod daily_backup;
mod movie_lighting;
mod public_ip;
mod vocab_import;
mod word_list;

use std::rc::Rc;
use std::time::Duration;

use crate::activity::{describe_idle_gate, ActivityMonitor, ForegroundWindow, IdleOnce, SystemIdle};
use crate::error::CoreError;
use crate::net::{HttpClient, TcpProbe};
use crate::sink::{DailyFileSink, FanoutSink, LogSink, TracingSink};
use crate::storage::{data_dir, Config};
use crate::task::{AllOf, OnPlatform, OncePerDay, Platform, Precondition, ShouldRun, Task};

pub use daily_backup::{DailyBackup, DailyBackupConfig, DEFAULT_BACKUP_NAME_FORMAT};
pub use movie_lighting::{
    HueBridge, LightController, MovieLighting, MovieLightingConfig, MovieLightingSettings,
};
pub use public_ip::{
    HttpIpLookup, IpInfo, IpLookup, PublicIpConfig, PublicIpMonitor, DEFAULT_IP_INFO_URL,
    DEFAULT_IP_URL,
};
pub use vocab_import::{VocabImport, VocabImportConfig};
pub use word_list::{sanitize_filename, WordListConfig, WordListWatcher, DEFAULT_EXPIRED_MARKER};

pub const PUBLIC_IP_LABEL: &str = "VPN";
pub const MOVIE_LIGHTING_LABEL: &str = "Hue react";
pub const WORD_LIST_LABEL: &str = "Dict.cc";
pub const VOCAB_IMPORT_LABEL: &str = "Kindle import";
pub const DAILY_BACKUP_LABEL: &str = "Backup";

/// Collaborators shared by every daemon of one process.
#[derive(Clone)]
pub struct Services {
    pub activity: ActivityMonitor,
    pub connectivity: Rc<TcpProbe>,
    pub http: Rc<HttpClient>,
    pub sink: Rc<dyn LogSink>,
}

impl Services {
    /// Build the host-backed services described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        let activity =
            ActivityMonitor::new(config.activity.classifier(ForegroundWindow, SystemIdle));

        let c = &config.connectivity;
        let connectivity = TcpProbe::new(c.host.clone(), c.port)
            .timeout(Duration::from_secs(c.timeout_secs))
            .cache_for(Duration::from_secs(c.cache_secs));

        let http = HttpClient::new(Duration::from_secs(config.http.timeout_secs))?;

        let sink: Rc<dyn LogSink> = if config.logging.to_file {
            let dir = config.log_dir()?;
            tracing::debug!(dir = %dir.display(), "task log files enabled");
            Rc::new(FanoutSink::new().with(TracingSink).with(DailyFileSink::new(dir)))
        } else {
            Rc::new(TracingSink)
        };

        Ok(Self {
            activity,
            connectivity: Rc::new(connectivity),
            http: Rc::new(http),
            sink,
        })
    }
}

/// Summary of a configured task, for listings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskInfo {
    pub label: String,
    pub enabled: bool,
    pub interval_secs: u64,
    pub platform: Option<Platform>,
    pub gate: String,
}

/// Every known task with its configured cadence, enabled or not.
pub fn describe(config: &Config) -> Vec<TaskInfo> {
    let d = &config.daemons;
    let info = |label: &str, enabled, interval_secs, platform: Option<Platform>| {
        let mut gate = platform_gate(platform);
        if label == DAILY_BACKUP_LABEL {
            gate = gate.and(OncePerDay);
        }
        let mut gate = gate.describe();
        if label == VOCAB_IMPORT_LABEL {
            if let Some(secs) = d.vocab_import.idle_after_secs {
                gate = match gate.as_str() {
                    "always" => describe_idle_gate(secs),
                    _ => format!("{gate} + {}", describe_idle_gate(secs)),
                };
            }
        }
        TaskInfo {
            label: label.to_string(),
            enabled,
            interval_secs,
            platform,
            gate,
        }
    };
    vec![
        info(
            crate::activity::ACTIVITY_TASK_LABEL,
            true,
            config.activity.sample_interval_secs,
            None,
        ),
        info(PUBLIC_IP_LABEL, d.public_ip.enabled, d.public_ip.interval_secs, d.public_ip.platform),
        info(
            MOVIE_LIGHTING_LABEL,
            d.movie_lighting.enabled,
            d.movie_lighting.interval_secs,
            d.movie_lighting.platform,
        ),
        info(WORD_LIST_LABEL, d.word_list.enabled, d.word_list.interval_secs, d.word_list.platform),
        info(
            VOCAB_IMPORT_LABEL,
            d.vocab_import.enabled,
            d.vocab_import.interval_secs,
            d.vocab_import.platform,
        ),
        info(
            DAILY_BACKUP_LABEL,
            d.daily_backup.enabled,
            d.daily_backup.interval_secs,
            d.daily_backup.platform,
        ),
    ]
}

fn platform_gate(platform: Option<Platform>) -> AllOf {
    match platform {
        Some(p) => AllOf::new().and(OnPlatform(p)),
        None => AllOf::new(),
    }
}

/// Assemble the enabled tasks, activity sampling first so later tasks in
/// the same tick see the fresh sample.
///
/// # Errors
///
/// Fails on invalid configuration (including unknown activity categories)
/// or when a daemon's persistent state cannot be read.
pub fn build_tasks(config: &Config, services: &Services) -> Result<Vec<Task>, CoreError> {
    config.validate()?;

    let d = &config.daemons;
    let online: Rc<dyn Precondition> = services.connectivity.clone();
    let mut tasks = vec![services.activity.task().sink(services.sink.clone())];

    let with_common = |task: Task, platform: Option<Platform>| {
        task.gate(platform_gate(platform)).sink(services.sink.clone())
    };

    if d.public_ip.enabled {
        let lookup = HttpIpLookup::new(
            services.http.clone(),
            d.public_ip.ip_url.clone(),
            d.public_ip.info_url.clone(),
        );
        let body = PublicIpMonitor::new(online.clone(), lookup);
        tasks.push(with_common(
            Task::new(PUBLIC_IP_LABEL, d.public_ip.interval_secs, body),
            d.public_ip.platform,
        ));
    }

    if d.movie_lighting.enabled {
        let m = &d.movie_lighting;
        let bridge = HueBridge::new(services.http.clone(), &m.bridge_url)?;
        let settings = MovieLightingSettings::from_config(m, &services.activity)?;
        let body = MovieLighting::new(bridge, services.activity.clone(), settings);
        let mut task = with_common(Task::new(MOVIE_LIGHTING_LABEL, m.interval_secs, body), m.platform);
        if m.requires_network {
            task = task.requires(online.clone());
        }
        tasks.push(task);
    }

    if d.word_list.enabled {
        let w = &d.word_list;
        let root = data_dir()?.join("word_list");
        let body = WordListWatcher::new(
            services.http.clone(),
            w.url.clone(),
            w.destination_dir.clone().unwrap_or_else(|| root.join("entries")),
            w.state_file.clone().unwrap_or_else(|| root.join("state.txt")),
        )
        .map_err(|source| CoreError::Task {
            label: WORD_LIST_LABEL.into(),
            source,
        })?
        .cookie(w.cookie.clone())
        .expired_marker(w.expired_marker.clone());
        let mut task = with_common(Task::new(WORD_LIST_LABEL, w.interval_secs, body), w.platform);
        if w.requires_network {
            task = task.requires(online.clone());
        }
        tasks.push(task);
    }

    if d.vocab_import.enabled {
        let v = &d.vocab_import;
        let done_dir = match &v.done_dir {
            Some(dir) => dir.clone(),
            None => data_dir()?.join("vocab_import"),
        };
        let body = VocabImport::new(v.database.clone(), done_dir);
        let mut gate = platform_gate(v.platform);
        if let Some(secs) = v.idle_after_secs {
            gate = gate.and(IdleOnce::new(services.activity.clone(), secs));
        }
        tasks.push(
            Task::new(VOCAB_IMPORT_LABEL, v.interval_secs, body)
                .gate(gate)
                .sink(services.sink.clone()),
        );
    }

    if d.daily_backup.enabled {
        let b = &d.daily_backup;
        let body = DailyBackup::new(b.source.clone(), b.destination_dir.clone())
            .name_format(b.name_format.clone());
        let gate = platform_gate(b.platform).and(OncePerDay);
        tasks.push(
            Task::new(DAILY_BACKUP_LABEL, b.interval_secs, body)
                .gate(gate)
                .sink(services.sink.clone()),
        );
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ContextSource, NoIdle};
    use crate::net::DEFAULT_HTTP_TIMEOUT;
    use crate::sink::MemorySink;

    struct Blank;

    impl ContextSource for Blank {
        fn current_context(&mut self) -> String {
            String::new()
        }
    }

    fn services(config: &Config) -> Services {
        Services {
            activity: ActivityMonitor::new(config.activity.classifier(Blank, NoIdle)),
            connectivity: Rc::new(TcpProbe::new("127.0.0.1", 9)),
            http: Rc::new(HttpClient::new(DEFAULT_HTTP_TIMEOUT).unwrap()),
            sink: Rc::new(MemorySink::new()),
        }
    }

    fn labels(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(Task::label).collect()
    }

    #[test]
    fn default_config_runs_activity_and_public_ip() {
        let config = Config::default();
        let tasks = build_tasks(&config, &services(&config)).unwrap();
        assert_eq!(labels(&tasks), vec!["Activity", "VPN"]);
        // The public IP monitor checks connectivity itself.
        assert!(tasks[1].precondition_name().is_none());
    }

    #[test]
    fn enabled_daemons_get_gates_and_preconditions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.daemons.public_ip.enabled = false;
        config.daemons.movie_lighting.enabled = true;
        config.daemons.movie_lighting.platform = Some(Platform::Windows);
        config.daemons.vocab_import.enabled = true;
        config.daemons.vocab_import.database = dir.path().join("vocab.db");
        config.daemons.vocab_import.done_dir = Some(dir.path().join("done"));
        config.daemons.daily_backup.enabled = true;
        config.daemons.daily_backup.source = dir.path().join("notes.db");
        config.daemons.daily_backup.destination_dir = dir.path().join("backups");

        let tasks = build_tasks(&config, &services(&config)).unwrap();
        assert_eq!(labels(&tasks), vec!["Activity", "Hue react", "Kindle import", "Backup"]);
        assert_eq!(tasks[1].precondition_name(), Some("connectivity"));
        assert_eq!(tasks[1].describe_gate(), "on windows");
        assert!(tasks[2].precondition_name().is_none());
        assert_eq!(tasks[3].describe_gate(), "daily");
    }

    #[test]
    fn unknown_category_stops_startup() {
        let mut config = Config::default();
        config.daemons.movie_lighting.enabled = true;
        config.daemons.movie_lighting.categories = "films".into();
        let err = build_tasks(&config, &services(&config)).err().unwrap();
        assert!(err.to_string().contains("films"));
    }

    #[test]
    fn describe_lists_every_daemon() {
        let listed = describe(&Config::default());
        assert_eq!(listed.len(), 6);
        assert!(listed.iter().filter(|t| t.enabled).count() == 2);
        assert_eq!(listed[0].label, "Activity");
        assert_eq!(listed[0].gate, "always");
        assert_eq!(listed[5].gate, "daily");
    }

    #[test]
    fn vocab_import_can_wait_for_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.daemons.public_ip.enabled = false;
        config.daemons.vocab_import.enabled = true;
        config.daemons.vocab_import.database = dir.path().join("vocab.db");
        config.daemons.vocab_import.done_dir = Some(dir.path().join("done"));
        config.daemons.vocab_import.idle_after_secs = Some(600);

        let mut tasks = build_tasks(&config, &services(&config)).unwrap();
        assert_eq!(tasks[1].describe_gate(), "idle > 600s");
        // Blank test services report no idle time, so the gate stays shut.
        let outcome = tasks[1].maybe_run(chrono::Local::now()).unwrap();
        assert!(matches!(outcome, crate::task::Outcome::Skipped(crate::task::SkipReason::GateDeclined)));

        let listed = describe(&config);
        assert_eq!(listed[4].gate, "idle > 600s");
    }

    #[test]
    fn activity_task_feeds_shared_monitor() {
        let config = Config::default();
        let services = services(&config);
        let tasks = build_tasks(&config, &services).unwrap();
        let mut sampler = tasks.into_iter().next().unwrap();
        sampler.maybe_run(chrono::Local::now()).unwrap();
        assert_eq!(services.activity.len(), 1);
    }
}
