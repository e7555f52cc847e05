//! Warm lights while a movie is playing, cold again afterwards.
//!
//! Only acts inside the configured daytime window and while the watched
//! light group is on (lights switched off by hand are left alone). Reacts to
//! edges: the scene is changed once when movie watching starts and once when
//! it stops.

use std::rc::Rc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::activity::{ActivityMonitor, CategorySelector};
use crate::error::{ConfigError, TaskError};
use crate::net::HttpClient;
use crate::task::{TaskBody, TaskContext};

/// The narrow slice of a lighting system this daemon needs.
pub trait LightController {
    fn group_any_on(&self, group: u32) -> Result<bool, TaskError>;
    fn activate_scene(&self, group: u32, scene: &str, transition: u32) -> Result<(), TaskError>;
    fn turn_off(&self, group: u32) -> Result<(), TaskError>;
}

/// Philips Hue bridge reached over its local REST API.
///
/// `base` is the user-scoped API root, e.g. `http://192.168.1.2/api/<user>/`.
pub struct HueBridge {
    http: Rc<HttpClient>,
    base: Url,
}

impl HueBridge {
    pub fn new(http: Rc<HttpClient>, base: &str) -> Result<Self, ConfigError> {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| ConfigError::InvalidValue {
            key: "daemons.movie_lighting.bridge_url".into(),
            message: e.to_string(),
        })?;
        Ok(Self { http, base })
    }

    fn url(&self, path: &str) -> Result<String, TaskError> {
        self.base
            .join(path)
            .map(String::from)
            .map_err(|e| TaskError::failed(format!("bad bridge path '{path}': {e}")))
    }

    fn put_action(&self, group: u32, body: serde_json::Value) -> Result<(), TaskError> {
        let resp = self.http.put_json(&self.url(&format!("groups/{group}/action"))?, &body)?;
        if !resp.contains("success") {
            return Err(TaskError::failed(format!("bridge rejected group {group} action: {resp}")));
        }
        Ok(())
    }
}

impl LightController for HueBridge {
    fn group_any_on(&self, group: u32) -> Result<bool, TaskError> {
        let state: serde_json::Value = self.http.get_json(&self.url(&format!("groups/{group}"))?)?;
        state["state"]["any_on"]
            .as_bool()
            .ok_or_else(|| TaskError::failed(format!("group {group} has no state.any_on")))
    }

    fn activate_scene(&self, group: u32, scene: &str, transition: u32) -> Result<(), TaskError> {
        self.put_action(group, json!({ "transitiontime": transition, "scene": scene }))
    }

    fn turn_off(&self, group: u32) -> Result<(), TaskError> {
        self.put_action(group, json!({ "on": false }))
    }
}

fn default_true() -> bool {
    true
}
fn default_interval() -> u64 {
    5
}
fn default_bridge_url() -> String {
    "http://192.168.1.2/api/newdeveloper/".into()
}
fn default_categories() -> String {
    "movie".into()
}
fn default_threshold() -> f64 {
    2.0
}
fn default_window() -> f64 {
    10.0
}
fn default_daytime_start() -> String {
    "10:00".into()
}
fn default_daytime_end() -> String {
    "20:00".into()
}
fn default_watch_group() -> u32 {
    1
}
fn default_off_group() -> u32 {
    3
}
fn default_warm_transition() -> u32 {
    80
}
fn default_cold_transition() -> u32 {
    1000
}

/// `[daemons.movie_lighting]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieLightingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub platform: Option<crate::task::Platform>,
    #[serde(default = "default_true")]
    pub requires_network: bool,
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// Activity categories that count as "watching": `"all"` or comma-separated.
    #[serde(default = "default_categories")]
    pub categories: String,
    #[serde(default = "default_threshold")]
    pub threshold_percent: f64,
    #[serde(default = "default_window")]
    pub window_minutes: f64,
    #[serde(default = "default_daytime_start")]
    pub daytime_start: String,
    #[serde(default = "default_daytime_end")]
    pub daytime_end: String,
    /// Group whose scene follows movie watching.
    #[serde(default = "default_watch_group")]
    pub watch_group: u32,
    /// Group switched off when a movie starts.
    #[serde(default = "default_off_group")]
    pub off_group: u32,
    #[serde(default)]
    pub warm_scene: String,
    #[serde(default)]
    pub cold_scene: String,
    #[serde(default = "default_warm_transition")]
    pub warm_transition: u32,
    #[serde(default = "default_cold_transition")]
    pub cold_transition: u32,
}

impl Default for MovieLightingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval(),
            platform: None,
            requires_network: true,
            bridge_url: default_bridge_url(),
            categories: default_categories(),
            threshold_percent: default_threshold(),
            window_minutes: default_window(),
            daytime_start: default_daytime_start(),
            daytime_end: default_daytime_end(),
            watch_group: default_watch_group(),
            off_group: default_off_group(),
            warm_scene: String::new(),
            cold_scene: String::new(),
            warm_transition: default_warm_transition(),
            cold_transition: default_cold_transition(),
        }
    }
}

fn parse_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| ConfigError::InvalidValue {
        key: format!("daemons.movie_lighting.{key}"),
        message: format!("expected HH:MM, got '{value}': {e}"),
    })
}

/// Validated form of [`MovieLightingConfig`].
#[derive(Debug, Clone)]
pub struct MovieLightingSettings {
    pub selector: CategorySelector,
    pub threshold_percent: f64,
    pub window_minutes: f64,
    pub daytime: (NaiveTime, NaiveTime),
    pub watch_group: u32,
    pub off_group: u32,
    pub warm_scene: String,
    pub cold_scene: String,
    pub warm_transition: u32,
    pub cold_transition: u32,
}

impl MovieLightingSettings {
    /// Resolve category names and times against the running monitor.
    pub fn from_config(config: &MovieLightingConfig, activity: &ActivityMonitor) -> Result<Self, ConfigError> {
        crate::activity::validate_threshold(config.threshold_percent)?;
        Ok(Self {
            selector: activity.selector(&config.categories)?,
            threshold_percent: config.threshold_percent,
            window_minutes: config.window_minutes,
            daytime: (
                parse_time("daytime_start", &config.daytime_start)?,
                parse_time("daytime_end", &config.daytime_end)?,
            ),
            watch_group: config.watch_group,
            off_group: config.off_group,
            warm_scene: config.warm_scene.clone(),
            cold_scene: config.cold_scene.clone(),
            warm_transition: config.warm_transition,
            cold_transition: config.cold_transition,
        })
    }
}

pub struct MovieLighting {
    lights: Box<dyn LightController>,
    activity: ActivityMonitor,
    settings: MovieLightingSettings,
    warm: bool,
}

impl MovieLighting {
    pub fn new(
        lights: impl LightController + 'static,
        activity: ActivityMonitor,
        settings: MovieLightingSettings,
    ) -> Self {
        Self {
            lights: Box::new(lights),
            activity,
            settings,
            warm: false,
        }
    }

    pub fn is_warm(&self) -> bool {
        self.warm
    }

    fn is_daytime(&self, at: NaiveTime) -> bool {
        let (start, end) = self.settings.daytime;
        start < at && at < end
    }
}

impl TaskBody for MovieLighting {
    fn run(&mut self, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
        if !self.is_daytime(ctx.now().time()) {
            return Ok(());
        }
        let s = &self.settings;
        if !self.lights.group_any_on(s.watch_group)? {
            return Ok(());
        }

        let watching = self
            .activity
            .evaluate_selector(&s.selector, s.threshold_percent, s.window_minutes)?;

        if watching && !self.warm {
            ctx.log("Movie is being watched. Turning lights warm...");
            self.lights.turn_off(s.off_group)?;
            self.lights
                .activate_scene(s.watch_group, &s.warm_scene, s.warm_transition)?;
            self.warm = true;
        } else if !watching && self.warm {
            ctx.log("No movie is being watched anymore. Turning lights cold...");
            self.lights
                .activate_scene(s.watch_group, &s.cold_scene, s.cold_transition)?;
            self.warm = false;
        }
        Ok(())
    }
}
