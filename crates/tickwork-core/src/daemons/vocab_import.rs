//! Imports looked-up words from an e-reader's vocabulary database.
//!
//! The reader keeps a SQLite file with a `WORDS` table; it only appears
//! while the device is mounted. Every word not already recorded in the done
//! directory is written to a new timestamped file there.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::task::{TaskBody, TaskContext};

fn default_interval() -> u64 {
    10
}

/// `[daemons.vocab_import]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabImportConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub platform: Option<crate::task::Platform>,
    /// e.g. `/media/<user>/Kindle/system/vocabulary/vocab.db`
    #[serde(default)]
    pub database: PathBuf,
    /// Defaults to `<data_dir>/vocab_import`.
    #[serde(default)]
    pub done_dir: Option<PathBuf>,
    /// When set, import only once per idle period longer than this.
    #[serde(default)]
    pub idle_after_secs: Option<u64>,
}

impl Default for VocabImportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval(),
            platform: None,
            database: PathBuf::new(),
            done_dir: None,
            idle_after_secs: None,
        }
    }
}

pub struct VocabImport {
    database: PathBuf,
    done_dir: PathBuf,
}

impl VocabImport {
    pub fn new(database: impl Into<PathBuf>, done_dir: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            done_dir: done_dir.into(),
        }
    }

    /// Words recorded in any file of the done directory.
    pub fn done_words(&self) -> Result<HashSet<String>, TaskError> {
        let mut done = HashSet::new();
        if !self.done_dir.is_dir() {
            return Ok(done);
        }
        for entry in fs::read_dir(&self.done_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            done.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(String::from),
            );
        }
        Ok(done)
    }

    /// Stems from the reader database, oldest lookup first.
    pub fn reader_words(&self) -> Result<Vec<String>, TaskError> {
        let conn = Connection::open_with_flags(&self.database, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let mut stmt = conn.prepare("SELECT stem, timestamp FROM WORDS ORDER BY timestamp")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut words = Vec::new();
        for stem in rows {
            words.push(stem?);
        }
        Ok(words)
    }
}

impl TaskBody for VocabImport {
    fn run(&mut self, ctx: &TaskContext<'_>) -> Result<(), TaskError> {
        if !self.database.is_file() {
            return Ok(());
        }

        let done = self.done_words()?;
        let mut new: Vec<String> = Vec::new();
        for word in self.reader_words()? {
            let word = word.trim().to_string();
            if !word.is_empty() && !done.contains(&word) && !new.contains(&word) {
                new.push(word);
            }
        }
        if new.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(&self.done_dir)?;
        let path = self
            .done_dir
            .join(ctx.now().format("%Y-%m-%d %H-%M-%S imported.txt").to_string());
        fs::write(&path, new.join("\n"))?;
        ctx.log(format!("Imported {} new words: {}", new.len(), new.join(", ")));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use chrono::{Local, TimeZone};
    use rusqlite::params;
    use std::path::Path;

    fn reader_db(path: &Path, words: &[(&str, i64)]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch("CREATE TABLE WORDS (id TEXT PRIMARY KEY, word TEXT, stem TEXT, lang TEXT, timestamp INTEGER)")
            .unwrap();
        for (stem, ts) in words {
            conn.execute(
                "INSERT INTO WORDS (id, word, stem, lang, timestamp) VALUES (?1, ?1, ?1, 'en', ?2)",
                params![stem, ts],
            )
            .unwrap();
        }
    }

    fn run(body: &mut VocabImport, sink: &MemorySink) {
        let now = Local.with_ymd_and_hms(2021, 10, 3, 18, 30, 0).unwrap();
        body.run(&TaskContext::new("Kindle import", now, sink)).unwrap();
    }

    #[test]
    fn missing_database_is_a_quiet_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = VocabImport::new(dir.path().join("vocab.db"), dir.path().join("done"));
        let sink = MemorySink::new();
        run(&mut body, &sink);
        assert!(sink.lines().is_empty());
        assert!(!dir.path().join("done").exists());
    }

    #[test]
    fn imports_only_unseen_words_in_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("vocab.db");
        reader_db(&db, &[("wistful", 30), ("ennui", 10), ("gaunt", 20)]);
        let done = dir.path().join("done");
        fs::create_dir_all(&done).unwrap();
        fs::write(done.join("older.txt"), "# imported by hand\ngaunt\n").unwrap();

        let sink = MemorySink::new();
        let mut body = VocabImport::new(&db, &done);
        run(&mut body, &sink);

        let written = fs::read_to_string(done.join("2021-10-03 18-30-00 imported.txt")).unwrap();
        assert_eq!(written, "ennui\nwistful");
        assert_eq!(sink.texts_for("Kindle import"), vec!["Imported 2 new words: ennui, wistful"]);

        // Everything is recorded now; a second pass adds nothing.
        let sink = MemorySink::new();
        run(&mut body, &sink);
        assert!(sink.lines().is_empty());
        assert_eq!(fs::read_dir(&done).unwrap().count(), 2);
    }
}
