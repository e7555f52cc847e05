//! Network collaborators: reachability probe and the shared HTTP client.

pub mod http;
mod probe;

pub use http::{HttpClient, TextResponse, DEFAULT_HTTP_TIMEOUT};
pub use probe::{TcpProbe, DEFAULT_PROBE_HOST, DEFAULT_PROBE_PORT, DEFAULT_PROBE_TIMEOUT};
