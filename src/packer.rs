/*!
 * Packing the selected files into a document
 */

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use indicatif::ProgressBar;
use tracing::{debug, warn};

use crate::tree::SelectionTree;
use crate::types::{Classification, SkipReason};
use crate::utils::{format_file_size, to_slash_path};

/// Content of one packed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryBody {
    /// Full text of the file
    Content(String),
    /// The file was selected but contributed nothing
    Skipped {
        reason: SkipReason,
        /// Human-readable explanation
        detail: String,
    },
}

/// One selected file in a packed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedEntry {
    /// Path relative to the project root, `/`-separated
    pub relative_path: String,
    pub body: EntryBody,
}

impl PackedEntry {
    pub fn is_included(&self) -> bool {
        matches!(self.body, EntryBody::Content(_))
    }

    pub fn content(&self) -> Option<&str> {
        match &self.body {
            EntryBody::Content(content) => Some(content),
            EntryBody::Skipped { .. } => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match &self.body {
            EntryBody::Content(_) => None,
            EntryBody::Skipped { reason, .. } => Some(*reason),
        }
    }
}

/// Aggregates gathered while packing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackMetrics {
    /// Files whose content was included
    pub file_count: usize,
    /// Bytes of included content
    pub total_bytes: u64,
    /// Selected files that were skipped
    pub skipped_count: usize,
}

/// Result of one pack request; never modified afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedDocument {
    /// Name of the project root directory
    pub project: String,
    /// Size threshold that applied
    pub size_limit: u64,
    /// Entries in traversal order
    pub entries: Vec<PackedEntry>,
    pub metrics: PackMetrics,
}

impl PackedDocument {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn included(&self) -> impl Iterator<Item = &PackedEntry> {
        self.entries.iter().filter(|e| e.is_included())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &PackedEntry> {
        self.entries.iter().filter(|e| !e.is_included())
    }

    pub fn entry(&self, relative_path: &str) -> Option<&PackedEntry> {
        self.entries.iter().find(|e| e.relative_path == relative_path)
    }
}

/// Walks the selection and produces [`PackedDocument`]s
#[derive(Debug, Clone, Default)]
pub struct OutputPacker {
    progress: Option<Arc<ProgressBar>>,
}

impl OutputPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report per-file progress on `progress`
    pub fn with_progress(mut self, progress: Arc<ProgressBar>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Pack every selected, eligible file of `tree`
    ///
    /// Entries follow the tree's display order, so the same selection always
    /// produces the same document. Files that cannot be included are kept as
    /// skip entries with a reason; this never fails.
    pub fn pack(&self, tree: &mut SelectionTree) -> PackedDocument {
        let files = tree.selected_files();
        if let Some(progress) = &self.progress {
            progress.set_length(files.len() as u64);
            progress.set_position(0);
        }

        let size_limit = tree.filter().max_file_size();
        let mut entries = Vec::with_capacity(files.len());
        let mut metrics = PackMetrics::default();

        for id in files {
            let Ok(node) = tree.node(id) else { continue };
            let path = node.path.clone();
            let size = node.size;
            let relative_path = to_slash_path(&node.relative_path);

            if let Some(progress) = &self.progress {
                progress.set_message(relative_path.clone());
            }

            let classification = tree
                .classify(id)
                .ok()
                .flatten()
                .unwrap_or(Classification::Unreadable);

            let body = match classification.skip_reason() {
                None => match read_capped(&path, size_limit) {
                    Ok(bytes) if bytes.len() as u64 > size_limit => {
                        // Grew past the limit since it was scanned
                        let size = fs::metadata(&path)
                            .map(|m| m.len())
                            .unwrap_or(bytes.len() as u64);
                        debug!("{} grew to {} bytes", path.display(), size);
                        metrics.skipped_count += 1;
                        EntryBody::Skipped {
                            reason: SkipReason::TooLarge,
                            detail: describe_skip(SkipReason::TooLarge, size),
                        }
                    }
                    Ok(bytes) => {
                        metrics.file_count += 1;
                        metrics.total_bytes += bytes.len() as u64;
                        EntryBody::Content(String::from_utf8_lossy(&bytes).into_owned())
                    }
                    Err(e) => {
                        warn!("Failed to read {}: {}", path.display(), e);
                        metrics.skipped_count += 1;
                        EntryBody::Skipped {
                            reason: SkipReason::Unreadable,
                            detail: format!("Failed to read file content: {}", e),
                        }
                    }
                },
                Some(reason) => {
                    metrics.skipped_count += 1;
                    EntryBody::Skipped {
                        reason,
                        detail: describe_skip(reason, size),
                    }
                }
            };

            entries.push(PackedEntry {
                relative_path,
                body,
            });

            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }

        debug!(
            "Packed {} files ({} bytes), skipped {}",
            metrics.file_count, metrics.total_bytes, metrics.skipped_count
        );

        let root = tree.root();
        PackedDocument {
            project: tree.node(root).map(|n| n.name.clone()).unwrap_or_default(),
            size_limit,
            entries,
            metrics,
        }
    }
}

/// Read at most one byte past `limit`, so a longer result means the file is too large
fn read_capped(path: &Path, limit: u64) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)?
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn describe_skip(reason: SkipReason, size: u64) -> String {
    match reason {
        SkipReason::Binary => "Binary file, content not included".to_string(),
        SkipReason::TooLarge => format!(
            "File too large to include content. Size: {}",
            format_file_size(size)
        ),
        SkipReason::Unreadable => "File could not be read".to_string(),
    }
}
