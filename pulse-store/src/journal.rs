//! Append-only JSONL journal backing the in-memory tables.
//!
//! Every accepted insert is appended as one JSON line per record before it
//! becomes visible in memory. On startup the files are replayed in order, so
//! acceptance order survives restarts.
//!
//! Replay is forgiving: a missing file means first run, and a malformed line
//! (e.g. a torn final write after a crash) is logged and skipped.

use pulse_core::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalFile {
    Logs,
    Speedtests,
}

impl JournalFile {
    fn file_name(self) -> &'static str {
        match self {
            JournalFile::Logs => "logs.jsonl",
            JournalFile::Speedtests => "speedtests.jsonl",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    /// Use `dir` for journal files, creating it if needed.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path(&self, file: JournalFile) -> PathBuf {
        self.dir.join(file.file_name())
    }

    /// Append `items` as JSON lines and sync to disk.
    ///
    /// All items are encoded before the file is touched, so an encoding
    /// failure writes nothing.
    pub async fn append<T: Serialize>(
        &self,
        file: JournalFile,
        items: &[T],
    ) -> Result<(), StoreError> {
        let mut buf = Vec::with_capacity(items.len() * 256);
        for item in items {
            serde_json::to_writer(&mut buf, item)?;
            buf.push(b'\n');
        }

        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(file))
            .await?;
        f.write_all(&buf).await?;
        f.flush().await?;
        f.sync_data().await?;
        Ok(())
    }

    /// Read back every well-formed line, in file order.
    pub fn replay<T: DeserializeOwned>(&self, file: JournalFile) -> Result<Vec<T>, StoreError> {
        let path = self.path(file);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "journal: no file found, starting fresh");
            return Ok(Vec::new());
        }

        let data = std::fs::read_to_string(&path)?;
        let mut out = Vec::new();
        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(line) {
                Ok(item) => out.push(item),
                Err(e) => tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    line = lineno + 1,
                    "journal: malformed line, skipping"
                ),
            }
        }
        Ok(out)
    }
}
