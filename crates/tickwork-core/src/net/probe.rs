use std::cell::Cell;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::task::Precondition;

pub const DEFAULT_PROBE_HOST: &str = "8.8.8.8";
pub const DEFAULT_PROBE_PORT: u16 = 53;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Internet reachability, checked by opening a TCP connection to a
/// well-known DNS server.
///
/// The answer is cached for `cache_for` so a tick with many
/// network-dependent tasks probes once.
#[derive(Debug)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
    cache_for: Duration,
    cached: Cell<Option<(Instant, bool)>>,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_HOST, DEFAULT_PROBE_PORT)
    }
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_PROBE_TIMEOUT,
            cache_for: Duration::ZERO,
            cached: Cell::new(None),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache_for(mut self, cache_for: Duration) -> Self {
        self.cache_for = cache_for;
        self
    }

    /// Probe now, bypassing the cache.
    pub fn probe(&self) -> bool {
        let addrs: Vec<SocketAddr> = match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                tracing::debug!(host = %self.host, "connectivity probe could not resolve host: {e}");
                return false;
            }
        };
        addrs
            .iter()
            .any(|addr| TcpStream::connect_timeout(addr, self.timeout).is_ok())
    }

    pub fn has_connectivity(&self) -> bool {
        if let Some((at, online)) = self.cached.get() {
            if at.elapsed() < self.cache_for {
                return online;
            }
        }
        let online = self.probe();
        self.cached.set(Some((Instant::now(), online)));
        online
    }
}

impl Precondition for TcpProbe {
    fn name(&self) -> &str {
        "connectivity"
    }

    fn is_met(&self) -> bool {
        self.has_connectivity()
    }
}
