//! Blocking facade over an async `reqwest` client.
//!
//! Task bodies are synchronous, so the client owns a current-thread tokio
//! runtime and blocks on each request. One instance is built at startup and
//! shared between daemons.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};

use crate::error::{CoreError, TaskError};

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct TextResponse {
    pub status: StatusCode,
    pub body: String,
}

pub struct HttpClient {
    runtime: Runtime,
    client: Client,
}

impl HttpClient {
    /// # Errors
    ///
    /// Fails when the runtime or the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, CoreError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tickwork/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoreError::Custom(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { runtime, client })
    }

    fn send(&self, request: RequestBuilder) -> Result<TextResponse, TaskError> {
        self.runtime.block_on(async {
            let resp = request.send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            Ok::<_, TaskError>(TextResponse { status, body })
        })
    }

    /// GET `url`, returning status and body whatever the status.
    pub fn get(&self, url: &str) -> Result<TextResponse, TaskError> {
        self.send(self.client.get(url))
    }

    /// GET `url` with a `Cookie` header.
    pub fn get_with_cookie(&self, url: &str, cookie: &str) -> Result<TextResponse, TaskError> {
        self.send(self.client.get(url).header(reqwest::header::COOKIE, cookie))
    }

    /// GET `url` and require a success status.
    pub fn get_text(&self, url: &str) -> Result<String, TaskError> {
        let resp = self.get(url)?;
        ensure_success("GET", url, &resp)?;
        Ok(resp.body)
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TaskError> {
        Ok(serde_json::from_str(&self.get_text(url)?)?)
    }

    /// PUT a JSON body; returns the response text.
    pub fn put_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<String, TaskError> {
        let resp = self.send(self.client.put(url).json(body))?;
        ensure_success("PUT", url, &resp)?;
        Ok(resp.body)
    }
}

fn ensure_success(method: &str, url: &str, resp: &TextResponse) -> Result<(), TaskError> {
    if resp.status.is_success() {
        Ok(())
    } else {
        Err(TaskError::failed(format!("{method} {url}: HTTP {}", resp.status)))
    }
}
