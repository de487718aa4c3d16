//! Per-group append-only chat logs
//!
//! One `<group>.chat` file per group. Writes are synchronous and
//! best-effort: a failed append or replay is traced and the in-memory chat
//! flow continues; a failed replay hands back an empty transcript.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOG_EXTENSION: &str = "chat";

/// Chat log I/O errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open log: {0}")]
    Open(std::io::Error),

    #[error("failed to append to log: {0}")]
    Append(std::io::Error),

    #[error("failed to scan log directory: {0}")]
    Scan(std::io::Error),
}

/// Append-only transcript store for all groups.
pub struct ChatStore {
    log_dir: PathBuf,
}

impl ChatStore {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Create the store, applying the startup retention policy. Purge
    /// failures are traced; the server still comes up.
    pub fn open(log_dir: impl Into<PathBuf>, purge_on_start: bool) -> Self {
        let store = Self::new(log_dir);
        if let Err(e) = fs::create_dir_all(&store.log_dir) {
            tracing::warn!(
                "Failed to create log directory {}: {}",
                store.log_dir.display(),
                e
            );
        }
        if purge_on_start {
            match store.purge() {
                Ok(count) => tracing::info!("Purged {} chat log(s) at startup", count),
                Err(e) => tracing::warn!("Failed to purge chat logs: {}", e),
            }
        }
        store
    }

    /// Group names come straight from user input; keep them path-safe
    /// before they become file stems.
    fn log_path(&self, group: &str) -> PathBuf {
        let stem: String = group
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.log_dir.join(format!("{stem}.{LOG_EXTENSION}"))
    }

    /// Append one message to a group's transcript.
    pub fn append(&self, group: &str, text: &str) {
        if let Err(e) = self.try_append(group, text) {
            tracing::warn!("Chat log append failed for '{}': {}", group, e);
        }
    }

    fn try_append(&self, group: &str, text: &str) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.log_path(group))
            .map_err(StorageError::Open)?;
        file.write_all(text.as_bytes())
            .map_err(StorageError::Append)?;
        Ok(())
    }

    /// Full transcript for a group, empty if there is none or it cannot be
    /// read.
    pub fn replay(&self, group: &str) -> String {
        match fs::read_to_string(self.log_path(group)) {
            Ok(transcript) => transcript,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::warn!("Chat log replay failed for '{}': {}", group, e);
                String::new()
            }
        }
    }

    /// Delete every `.chat` file in the log directory. Returns how many
    /// were removed.
    pub fn purge(&self) -> Result<usize, StorageError> {
        let mut removed = 0;
        let entries = match fs::read_dir(&self.log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::Scan(e)),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(LOG_EXTENSION) {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!("Failed to remove {}: {}", path.display(), e)
                    }
                }
            }
        }
        Ok(removed)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}
