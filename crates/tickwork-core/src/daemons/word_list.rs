//! Watches a remote word list and saves each new entry as its own file.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::net::HttpClient;
use crate::task::{TaskBody, TaskContext};

/// Text served instead of the list once the session cookie has expired.
pub const DEFAULT_EXPIRED_MARKER: &str = "auch möglich, eigene Vokabeln einzutippen";

const ILLEGAL_FILENAME_CHARS: &[char] = &['"', '/', '\\', '*', '?', '<', '>', '|', ':'];
const MAX_FILENAME_CHARS: usize = 50;

/// Make `text` safe as a file name on every supported platform.
///
/// `?` becomes `¿`, the other reserved characters become `-`. The result is
/// cut to 50 characters.
pub fn sanitize_filename(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '?' => '¿',
            c if ILLEGAL_FILENAME_CHARS.contains(&c) => '-',
            c => c,
        })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

fn default_interval() -> u64 {
    5
}
fn default_true() -> bool {
    true
}
fn default_expired_marker() -> String {
    DEFAULT_EXPIRED_MARKER.into()
}

/// `[daemons.word_list]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordListConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub platform: Option<crate::task::Platform>,
    #[serde(default = "default_true")]
    pub requires_network: bool,
    #[serde(default)]
    pub url: String,
    /// Full `Cookie` header value, e.g. `session=abc`.
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default = "default_expired_marker")]
    pub expired_marker: String,
    /// Defaults to `<data_dir>/word_list/entries`.
    #[serde(default)]
    pub destination_dir: Option<PathBuf>,
    /// Defaults to `<data_dir>/word_list/state.txt`.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Default for WordListConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval(),
            platform: None,
            requires_network: true,
            url: String::new(),
            cookie: None,
            expired_marker: default_expired_marker(),
            destination_dir: None,
            state_file: None,
        }
    }
}

pub struct WordListWatcher {
    http: Rc<HttpClient>,
    url: String,
    cookie: Option<String>,
    expired_marker: String,
    destination_dir: PathBuf,
    state_file: PathBuf,
    seen: Vec<String>,
}

impl WordListWatcher {
    /// Loads previously seen entries from `state_file`; a missing file means
    /// nothing has been seen yet.
    pub fn new(
        http: Rc<HttpClient>,
        url: impl Into<String>,
        destination_dir: impl Into<PathBuf>,
        state_file: impl Into<PathBuf>,
    ) -> Result<Self, TaskError> {
        let state_file = state_file.into();
        let seen = match fs::read_to_string(&state_file) {
            Ok(text) => non_empty_lines(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            http,
            url: url.into(),
            cookie: None,
            expired_marker: DEFAULT_EXPIRED_MARKER.into(),
            destination_dir: destination_dir.into(),
            state_file,
            seen,
        })
    }

    pub fn cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn expired_marker(mut self, marker: impl Into<String>) -> Self {
        self.expired_marker = marker.into();
        self
    }

    pub fn seen(&self) -> &[String] {
        &self.seen
    }

    fn download(&self) -> Result<String, TaskError> {
        let resp = match &self.cookie {
            Some(cookie) => self.http.get_with_cookie(&self.url, cookie)?,
            None => self.http.get(&self.url)?,
        };
        if resp.status != StatusCode::OK {
            return Err(TaskError::failed(format!("list download returned HTTP {}", resp.status)));
        }
        if !self.expired_marker.is_empty() && resp.body.contains(&self.expired_marker) {
            return Err(TaskError::failed("session expired"));
        }
        Ok(resp.body)
    }

    fn save_entry(&self, ctx: &TaskContext<'_>, index: usize, entry: &str) -> Result<PathBuf, TaskError> {
        let name = format!(
            "{} {index}   -   {}.txt",
            ctx.now().format("%Y-%m-%d %H-%M-%S"),
            sanitize_filename(&entry.replace('\t', " - ")),
        );
        let path = self.destination_dir.join(name);
        fs::write(&path, entry)?;
        Ok(path)
    }
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

fn append_lines(path: &Path, lines: &[String]) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

impl TaskBody for WordListWatcher {
    fn run(&mut self, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
        let body = self.download()?;

        let known: HashSet<&str> = self.seen.iter().map(String::as_str).collect();
        let mut new = Vec::new();
        for entry in non_empty_lines(&body) {
            if !known.contains(entry.as_str()) && !new.contains(&entry) {
                new.push(entry);
            }
        }
        if new.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(&self.destination_dir)?;
        ctx.log("New words:");
        let mut saved = Vec::with_capacity(new.len());
        let mut result = Ok(());
        for (i, entry) in new.into_iter().enumerate() {
            ctx.log(format!("\t{entry}"));
            if let Err(e) = self.save_entry(ctx, i, &entry) {
                result = Err(e);
                break;
            }
            saved.push(entry);
        }

        // Seen in memory even when the state append below fails.
        self.seen.extend(saved.iter().cloned());
        append_lines(&self.state_file, &saved)?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::DEFAULT_HTTP_TIMEOUT;
    use crate::sink::MemorySink;
    use chrono::{Local, TimeZone};

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename("what? a/b: c*d"), "what¿ a-b- c-d");
        assert_eq!(sanitize_filename(&"x".repeat(80)).chars().count(), 50);
    }

    fn watcher(server: &mockito::ServerGuard, dir: &Path) -> WordListWatcher {
        let http = Rc::new(HttpClient::new(DEFAULT_HTTP_TIMEOUT).unwrap());
        WordListWatcher::new(
            http,
            format!("{}/list.txt", server.url()),
            dir.join("entries"),
            dir.join("state.txt"),
        )
        .unwrap()
    }

    fn run(body: &mut WordListWatcher, sink: &MemorySink) -> Result<(), TaskError> {
        let now = Local.with_ymd_and_hms(2021, 9, 23, 14, 5, 9).unwrap();
        body.run(&TaskContext::new("Dict.cc", now, sink))
    }

    #[test]
    fn new_entries_are_saved_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("state.txt"), "apple\tApfel\n").unwrap();

        let mut server = mockito::Server::new();
        server
            .mock("GET", "/list.txt")
            .with_body("apple\tApfel\nwhy?\twarum?\n\n")
            .create();

        let sink = MemorySink::new();
        let mut body = watcher(&server, dir.path());
        run(&mut body, &sink).unwrap();
        run(&mut body, &sink).unwrap();

        let files: Vec<String> = fs::read_dir(dir.path().join("entries"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec!["2021-09-23 14-05-09 0   -   why¿ - warum¿.txt"]);

        let state = fs::read_to_string(dir.path().join("state.txt")).unwrap();
        assert_eq!(state, "apple\tApfel\nwhy?\twarum?\n");
        assert_eq!(sink.texts_for("Dict.cc"), vec!["New words:", "\twhy?\twarum?"]);
    }

    #[test]
    fn unwritable_state_does_not_duplicate_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/list.txt")
            .with_body("pear\tBirne\n")
            .expect(2)
            .create();

        let mut body = watcher(&server, dir.path());
        // A directory where the state file should be makes appends fail.
        fs::create_dir_all(dir.path().join("state.txt")).unwrap();

        let sink = MemorySink::new();
        assert!(run(&mut body, &sink).is_err());
        run(&mut body, &sink).unwrap();

        assert_eq!(fs::read_dir(dir.path().join("entries")).unwrap().count(), 1);
        assert_eq!(body.seen(), ["pear\tBirne".to_string()]);
    }

    #[test]
    fn expired_session_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/list.txt")
            .match_header("cookie", "session=old")
            .with_body(format!("<html>{DEFAULT_EXPIRED_MARKER}</html>"))
            .create();

        let mut body = watcher(&server, dir.path()).cookie(Some("session=old".into()));
        let err = run(&mut body, &MemorySink::new()).unwrap_err();
        assert!(err.to_string().contains("session expired"));
        assert!(!dir.path().join("entries").exists());
    }

    #[test]
    fn bad_status_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new();
        server.mock("GET", "/list.txt").with_status(403).create();

        let mut body = watcher(&server, dir.path());
        assert!(run(&mut body, &MemorySink::new()).is_err());
        assert!(body.seen().is_empty());
    }
}
