/*!
 * Recently opened project roots
 *
 * A small most-recent-first list, bounded in size, kept as JSON on disk.
 */

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Entries kept unless configured otherwise
pub const DEFAULT_CAPACITY: usize = 10;

/// Errors loading or saving the history
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The history file exists but could not be read
    #[error("Failed to read history {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    /// The history file is not valid JSON
    #[error("Invalid history file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The history could not be written
    #[error("Failed to save history {}: {source}", path.display())]
    Persist { path: PathBuf, source: io::Error },

    /// Serialization failed
    #[error("Failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One opened root and when it was last opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentHistoryEntry {
    pub root: PathBuf,
    pub last_opened: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    entries: Vec<RecentHistoryEntry>,
}

/// Bounded most-recently-used list of project roots
#[derive(Debug, Clone)]
pub struct HistoryStore {
    capacity: usize,
    entries: Vec<RecentHistoryEntry>,
    file: Option<PathBuf>,
}

impl HistoryStore {
    /// A history that is never written to disk
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
            file: None,
        }
    }

    /// Load the history kept at `path`
    ///
    /// A missing file gives an empty history. Roots that are no longer
    /// directories are dropped.
    pub fn load(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, HistoryError> {
        let path = path.into();
        let mut store = Self::in_memory(capacity);

        match fs::read_to_string(&path) {
            Ok(text) => {
                let file: HistoryFile =
                    serde_json::from_str(&text).map_err(|source| HistoryError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                store.entries = file
                    .entries
                    .into_iter()
                    .filter(|e| e.root.is_dir())
                    .take(store.capacity)
                    .collect();
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(HistoryError::Read { path, source }),
        }

        debug!("Loaded {} recent roots from {}", store.entries.len(), path.display());
        store.file = Some(path);
        Ok(store)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, most recent first
    pub fn list(&self) -> &[RecentHistoryEntry] {
        &self.entries
    }

    /// Mark `root` as opened now
    pub fn record(&mut self, root: &Path) -> Result<(), HistoryError> {
        self.record_at(root, Utc::now())
    }

    /// Mark `root` as opened at `at`
    ///
    /// The in-memory list is always updated; an error only means the file
    /// could not be rewritten.
    pub fn record_at(&mut self, root: &Path, at: DateTime<Utc>) -> Result<(), HistoryError> {
        self.entries.retain(|e| e.root != root);
        self.entries.insert(
            0,
            RecentHistoryEntry {
                root: root.to_path_buf(),
                last_opened: at,
            },
        );
        self.entries.truncate(self.capacity);
        self.save()
    }

    /// Rewrite the history file, if there is one
    pub fn save(&self) -> Result<(), HistoryError> {
        let Some(path) = &self.file else {
            return Ok(());
        };

        let text = serde_json::to_string_pretty(&HistoryFile {
            entries: self.entries.clone(),
        })?;

        let persist = |source| HistoryError::Persist {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(persist)?;
        }
        // Write then rename so a crash never leaves a truncated file
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, text).map_err(persist)?;
        fs::rename(&staging, path).map_err(persist)?;
        Ok(())
    }
}
