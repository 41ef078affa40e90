//! # Message Journal
//!
//! Append-only persistence for every message the relay sends, receives, or
//! generates. One line per entry:
//!
//! ```text
//! [2026-08-07 14:03:22] Base (!ab12): checking in
//! ```
//!
//! The journal is distinct from the process log: it is the station's traffic
//! record, not diagnostics. Entries are never rewritten and there is no
//! rotation or compaction.
//!
//! Writes are serialized through an async mutex so entries from concurrent
//! callers (dispatcher, inbound listener) are atomic with respect to each
//! other. Total ordering is the order of successful writes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::logutil::flatten;

/// Timestamp format used for journal entries.
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct MessageLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl MessageLog {
    /// Open (creating if needed) the journal at `path` for appending.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating journal directory {}", parent.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening journal {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one entry. The body is flattened onto a single line; the write
    /// is atomic with respect to other `append` calls.
    pub async fn append(&self, sender: &str, body: &str) -> Result<()> {
        let stamp = Local::now().format(STAMP_FORMAT);
        let line = format!("[{}] {}: {}\n", stamp, sender, flatten(body));
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("appending to journal {}", self.path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing journal {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries recorded so far. Reads the file; used by `status`.
    pub async fn entry_count(&self) -> Result<usize> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading journal {}", self.path.display()))?;
        Ok(content.lines().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_single_line_and_stamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("journal.txt");
        tokio_test::block_on(async {
            let journal = MessageLog::open(&path).await.expect("open");
            journal
                .append("Beacon", "PTC1 is active.\nstay safe")
                .await
                .expect("append");
            journal.append("You", "hello").await.expect("append");

            let content = tokio::fs::read_to_string(&path).await.unwrap();
            let lines: Vec<&str> = content.lines().collect();
            assert_eq!(lines.len(), 2);
            assert!(lines[0].contains("Beacon: PTC1 is active.\\nstay safe"));
            assert!(lines[1].ends_with("You: hello"));
            // every line carries a [YYYY-MM-DD HH:MM:SS] prefix
            for line in lines {
                assert_eq!(&line[0..1], "[");
                assert_eq!(&line[20..22], "] ");
            }
            assert_eq!(journal.entry_count().await.unwrap(), 2);
        });
    }
}
