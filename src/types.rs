/*!
 * Core types and data structures for repopacker
 */

use std::cmp::Ordering;
use std::path::PathBuf;

use strum::{AsRefStr, Display, EnumString};

use crate::error::ScanError;

/// Index of a node inside a [`SelectionTree`](crate::tree::SelectionTree) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeId overflow");
        Self(index as u32)
    }

    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Kind of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular file (or link to one)
    File,
    /// Directory (or link to one)
    Directory,
}

/// Tri-state selection flag
///
/// `Partial` only ever appears on directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Selection {
    #[default]
    Unselected,
    Partial,
    Selected,
}

/// Per-file verdict controlling whether its content is packed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    /// Readable text content
    Text,
    /// NUL bytes or too many control bytes in the sample
    Binary,
    /// Larger than the configured size threshold
    TooLarge,
    /// Could not be opened or read
    Unreadable,
}

impl Classification {
    /// Reason a file with this classification is skipped, `None` for text
    pub fn skip_reason(self) -> Option<SkipReason> {
        match self {
            Self::Text => None,
            Self::Binary => Some(SkipReason::Binary),
            Self::TooLarge => Some(SkipReason::TooLarge),
            Self::Unreadable => Some(SkipReason::Unreadable),
        }
    }
}

/// Why a selected file contributed no content to a packed document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    Binary,
    TooLarge,
    Unreadable,
}

/// Policy for ordering sibling names within a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum NameOrder {
    /// Follow the host filesystem's usual comparison
    #[default]
    Host,
    /// Byte-wise comparison of names
    CaseSensitive,
    /// Compare lowercased names, ties broken byte-wise
    CaseInsensitive,
}

impl NameOrder {
    /// Resolve `Host` into a concrete policy for the current platform
    pub fn resolve(self) -> Self {
        match self {
            Self::Host if cfg!(any(target_os = "macos", target_os = "windows")) => {
                Self::CaseInsensitive
            }
            Self::Host => Self::CaseSensitive,
            other => other,
        }
    }

    /// Compare two sibling names under this policy
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self.resolve() {
            Self::CaseInsensitive => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
            _ => a.cmp(b),
        }
    }
}

/// A file or directory entry in the selection tree
#[derive(Debug, Clone)]
pub struct Node {
    /// Absolute filesystem path
    pub path: PathBuf,
    /// Path relative to the packing root
    pub relative_path: PathBuf,
    /// Final path component
    pub name: String,
    /// File or directory
    pub kind: NodeKind,
    /// Size in bytes at scan time (0 for directories)
    pub size: u64,
    /// Parent node, used only for upward traversal
    pub parent: Option<NodeId>,
    /// Ordered children (directories only)
    pub children: Vec<NodeId>,
    /// Whether `children` reflects a completed scan
    pub loaded: bool,
    /// Current tri-state selection
    pub selection: Selection,
    /// Whether the ignore rules allow this node
    pub eligible: bool,
    /// Cached classification (files only)
    pub classification: Option<Classification>,
    /// The entry itself is a symbolic link
    pub symlink: bool,
    /// The entry or one of its ancestors was reached through a link
    pub via_link: bool,
    /// Error recorded when listing this directory failed
    pub scan_error: Option<ScanError>,
    /// UI expansion flag
    pub expanded: bool,
    /// Bumped whenever the children are dropped, so stale scans can be discarded
    pub generation: u64,
    /// Set once the node has been cut loose by a refresh of an ancestor
    pub detached: bool,
}

impl Node {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Turn the node into a detached tombstone, dropping what it owns
    ///
    /// The slot stays in the arena so ids handed out earlier keep failing
    /// with a detached error instead of naming a different node.
    pub(crate) fn release(&mut self) {
        self.detached = true;
        self.path = PathBuf::new();
        self.relative_path = PathBuf::new();
        self.name = String::new();
        self.children = Vec::new();
        self.scan_error = None;
        self.classification = None;
        self.selection = Selection::Unselected;
    }
}
