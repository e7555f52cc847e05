//! Public IP watcher -- logs connection changes (VPN up/down, offline).

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::net::HttpClient;
use crate::task::{Precondition, TaskBody, TaskContext};

pub const DEFAULT_IP_URL: &str = "https://checkip.amazonaws.com/";
pub const DEFAULT_IP_INFO_URL: &str = "https://ipinfo.io/{ip}/json";

fn default_true() -> bool {
    true
}
fn default_interval() -> u64 {
    5
}
fn default_ip_url() -> String {
    DEFAULT_IP_URL.into()
}
fn default_info_url() -> String {
    DEFAULT_IP_INFO_URL.into()
}

/// `[daemons.public_ip]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub platform: Option<crate::task::Platform>,
    #[serde(default = "default_ip_url")]
    pub ip_url: String,
    /// `{ip}` is replaced with the looked-up address.
    #[serde(default = "default_info_url")]
    pub info_url: String,
}

impl Default for PublicIpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval(),
            platform: None,
            ip_url: default_ip_url(),
            info_url: default_info_url(),
        }
    }
}

/// Location details for an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IpInfo {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
}

/// Where the public address and its location come from.
pub trait IpLookup {
    fn public_ip(&self) -> Result<String, TaskError>;
    fn ip_info(&self, ip: &str) -> Result<IpInfo, TaskError>;
}

/// Plain-text IP echo service plus an ipinfo-style JSON endpoint.
///
/// `info_url` may contain `{ip}`, replaced with the address looked up.
pub struct HttpIpLookup {
    http: Rc<HttpClient>,
    ip_url: String,
    info_url: String,
}

impl HttpIpLookup {
    pub fn new(http: Rc<HttpClient>, ip_url: impl Into<String>, info_url: impl Into<String>) -> Self {
        Self {
            http,
            ip_url: ip_url.into(),
            info_url: info_url.into(),
        }
    }
}

impl IpLookup for HttpIpLookup {
    fn public_ip(&self) -> Result<String, TaskError> {
        let ip = self.http.get_text(&self.ip_url)?.trim().to_string();
        if ip.is_empty() {
            return Err(TaskError::failed(format!("{} returned an empty address", self.ip_url)));
        }
        Ok(ip)
    }

    fn ip_info(&self, ip: &str) -> Result<IpInfo, TaskError> {
        self.http.get_json(&self.info_url.replace("{ip}", ip))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Connection {
    Offline,
    Online(String),
}

/// Logs whenever the public address or connection state changes.
///
/// Checks connectivity itself, so the task must not carry a connectivity
/// precondition.
pub struct PublicIpMonitor {
    connectivity: Rc<dyn Precondition>,
    lookup: Box<dyn IpLookup>,
    last: Option<Connection>,
    known: HashMap<String, IpInfo>,
}

impl PublicIpMonitor {
    pub fn new(connectivity: Rc<dyn Precondition>, lookup: impl IpLookup + 'static) -> Self {
        Self {
            connectivity,
            lookup: Box::new(lookup),
            last: None,
            known: HashMap::new(),
        }
    }

    pub fn current_ip(&self) -> Option<&str> {
        match &self.last {
            Some(Connection::Online(ip)) => Some(ip),
            _ => None,
        }
    }
}

impl TaskBody for PublicIpMonitor {
    fn run(&mut self, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
        let now = if self.connectivity.is_met() {
            Connection::Online(self.lookup.public_ip()?)
        } else {
            Connection::Offline
        };

        if self.last.as_ref() != Some(&now) {
            match &now {
                Connection::Online(ip) => {
                    if !self.known.contains_key(ip) {
                        let info = self.lookup.ip_info(ip)?;
                        self.known.insert(ip.clone(), info);
                    }
                    let info = &self.known[ip];
                    ctx.log(format!("Connected as {ip} ({} / {})", info.country, info.city));
                }
                Connection::Offline => ctx.warn("No internet connection"),
            }
        }
        self.last = Some(now);
        Ok(())
    }
}
