/*!
 * Lazy directory listing
 *
 * A directory is listed one level at a time, when it is expanded or when a
 * selection operation needs its children. Listings can run on another thread
 * through [`ScanJob`]; the result is handed back to the tree as a
 * [`ScanOutcome`].
 */

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;
use crate::filter::IgnoreFilter;
use crate::types::{Classification, NameOrder, NodeId, NodeKind};

/// What to list, captured from a directory node
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Directory node the listing belongs to
    pub node: NodeId,
    /// Node generation when the request was issued
    pub generation: u64,
    /// Absolute path of the directory
    pub path: PathBuf,
    /// Path relative to the packing root
    pub relative_path: PathBuf,
    /// Whether the directory itself is eligible
    pub eligible: bool,
    /// Whether the directory was reached through a symbolic link
    pub via_link: bool,
}

/// One child found by a listing
#[derive(Debug, Clone)]
pub struct ScannedEntry {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub eligible: bool,
    pub symlink: bool,
    pub via_link: bool,
    /// Known up front for entries that can never be read
    pub classification: Option<Classification>,
}

impl ScannedEntry {
    /// Directory that must never be listed (link cycle or nested link)
    pub fn is_sealed(&self) -> bool {
        self.kind == NodeKind::Directory && self.classification == Some(Classification::Unreadable)
    }
}

/// Result of listing one directory
#[derive(Debug)]
pub struct ScanOutcome {
    pub node: NodeId,
    pub generation: u64,
    /// Children in display order
    pub entries: Vec<ScannedEntry>,
    /// Set when the directory itself could not be read
    pub error: Option<ScanError>,
}

/// Lists directories in the order the tree displays and packs them
#[derive(Debug, Clone, Default)]
pub struct FileSystemScanner {
    name_order: NameOrder,
}

impl FileSystemScanner {
    pub fn new(name_order: NameOrder) -> Self {
        Self { name_order }
    }

    pub fn name_order(&self) -> NameOrder {
        self.name_order
    }

    /// List the direct children of the requested directory
    ///
    /// Never fails as a whole: an unreadable directory produces an empty
    /// listing with `error` set, and entries whose metadata cannot be read
    /// are skipped.
    pub fn list_children(&self, request: &ScanRequest, filter: &IgnoreFilter) -> ScanOutcome {
        filter.load_ignore_file(&request.path);

        // Canonical location of the directory, for the link cycle guard
        let anchor = fs::canonicalize(&request.path).ok();

        let mut entries = Vec::new();
        let mut error = None;

        let walker = WalkDir::new(&request.path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false);

        for item in walker {
            match item {
                Ok(entry) => match self.process_entry(&entry, request, filter, anchor.as_deref()) {
                    Ok(scanned) => entries.push(scanned),
                    Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
                },
                Err(err) if err.depth() == 0 => {
                    let err = io::Error::from(err);
                    warn!("Cannot list {}: {}", request.path.display(), err);
                    error = Some(ScanError::new(&request.path, &err));
                    break;
                }
                Err(err) => warn!("Skipping entry in {}: {}", request.path.display(), err),
            }
        }

        let order = self.name_order;
        entries.sort_by(|a, b| {
            let a_dir = a.kind == NodeKind::Directory;
            let b_dir = b.kind == NodeKind::Directory;
            b_dir
                .cmp(&a_dir)
                .then_with(|| order.compare(&a.name, &b.name))
        });

        debug!(
            "Listed {} entries in {}",
            entries.len(),
            request.path.display()
        );

        ScanOutcome {
            node: request.node,
            generation: request.generation,
            entries,
            error,
        }
    }

    /// Build the record for a single directory entry
    fn process_entry(
        &self,
        entry: &DirEntry,
        request: &ScanRequest,
        filter: &IgnoreFilter,
        anchor: Option<&Path>,
    ) -> io::Result<ScannedEntry> {
        let name = entry.file_name().to_string_lossy().to_string();
        let path = request.path.join(entry.file_name());
        let relative_path = request.relative_path.join(entry.file_name());
        let symlink = entry.path_is_symlink();

        let mut classification = None;
        let mut guarded = false;

        let (kind, size) = if symlink {
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    // Links are followed one level only, and never back up the tree
                    if request.via_link || links_to_ancestor(&path, anchor) {
                        debug!("Not following directory link {}", path.display());
                        guarded = true;
                        classification = Some(Classification::Unreadable);
                    }
                    (NodeKind::Directory, 0)
                }
                Ok(meta) => {
                    if !meta.is_file() {
                        classification = Some(Classification::Unreadable);
                    }
                    (NodeKind::File, meta.len())
                }
                Err(e) => {
                    debug!("Broken link {}: {}", path.display(), e);
                    classification = Some(Classification::Unreadable);
                    (NodeKind::File, 0)
                }
            }
        } else {
            let meta = entry.metadata().map_err(io::Error::from)?;
            if meta.is_dir() {
                (NodeKind::Directory, 0)
            } else {
                // Sockets, fifos and devices are listed but never opened
                if !meta.is_file() {
                    classification = Some(Classification::Unreadable);
                }
                (NodeKind::File, meta.len())
            }
        };

        let eligible = request.eligible
            && !guarded
            && filter.is_eligible(&path, kind == NodeKind::Directory);

        Ok(ScannedEntry {
            path,
            relative_path,
            name,
            kind,
            size,
            eligible,
            symlink,
            via_link: request.via_link || symlink,
            classification,
        })
    }
}

/// Whether the link at `path` resolves to `anchor` or one of its ancestors
fn links_to_ancestor(path: &Path, anchor: Option<&Path>) -> bool {
    match (fs::canonicalize(path), anchor) {
        (Ok(target), Some(anchor)) => anchor.starts_with(target),
        // Unresolvable either way: do not descend
        _ => true,
    }
}

/// A listing detached from the tree so it can run on a worker thread
#[derive(Debug)]
pub struct ScanJob {
    request: ScanRequest,
    scanner: FileSystemScanner,
    filter: Arc<IgnoreFilter>,
}

impl ScanJob {
    pub fn new(request: ScanRequest, scanner: FileSystemScanner, filter: Arc<IgnoreFilter>) -> Self {
        Self {
            request,
            scanner,
            filter,
        }
    }

    pub fn request(&self) -> &ScanRequest {
        &self.request
    }

    /// Perform the blocking listing
    pub fn run(self) -> ScanOutcome {
        self.scanner.list_children(&self.request, &self.filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::IgnoreRuleSet;
    use std::fs::File;
    use tempfile::tempdir;

    fn request_for(path: &Path) -> ScanRequest {
        ScanRequest {
            node: NodeId(0),
            generation: 0,
            path: path.to_path_buf(),
            relative_path: PathBuf::new(),
            eligible: true,
            via_link: false,
        }
    }

    fn filter_for(root: &Path, patterns: &[&str]) -> IgnoreFilter {
        let rules = IgnoreRuleSet::from_patterns(root, patterns.iter().copied()).unwrap();
        IgnoreFilter::new(rules, 1024, 512)
    }

    #[test]
    fn test_directories_first_then_names() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        File::create(root.join("b.txt")).unwrap();
        File::create(root.join("a.txt")).unwrap();
        fs::create_dir(root.join("zdir")).unwrap();
        fs::create_dir(root.join("adir")).unwrap();

        let scanner = FileSystemScanner::new(NameOrder::CaseSensitive);
        let outcome = scanner.list_children(&request_for(&root), &filter_for(&root, &[]));

        let names: Vec<_> = outcome.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["adir", "zdir", "a.txt", "b.txt"]);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.entries[0].relative_path, PathBuf::from("adir"));
    }

    #[test]
    fn test_case_policies() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        File::create(root.join("beta")).unwrap();
        File::create(root.join("Zeta")).unwrap();
        File::create(root.join("alpha")).unwrap();

        let filter = filter_for(&root, &[]);
        let sensitive = FileSystemScanner::new(NameOrder::CaseSensitive)
            .list_children(&request_for(&root), &filter);
        let names: Vec<_> = sensitive.entries.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["Zeta", "alpha", "beta"]);

        let insensitive = FileSystemScanner::new(NameOrder::CaseInsensitive)
            .list_children(&request_for(&root), &filter);
        let names: Vec<_> = insensitive.entries.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["alpha", "beta", "Zeta"]);
    }

    #[test]
    fn test_ignored_entries_are_listed_but_ineligible() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        File::create(root.join("keep.rs")).unwrap();
        File::create(root.join("drop.log")).unwrap();

        let scanner = FileSystemScanner::default();
        let outcome = scanner.list_children(&request_for(&root), &filter_for(&root, &["*.log"]));

        assert_eq!(outcome.entries.len(), 2);
        let log = outcome.entries.iter().find(|e| e.name == "drop.log").unwrap();
        assert!(!log.eligible);
        let rs = outcome.entries.iter().find(|e| e.name == "keep.rs").unwrap();
        assert!(rs.eligible);
    }

    #[test]
    fn test_missing_directory_records_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");

        let scanner = FileSystemScanner::default();
        let outcome = scanner.list_children(&request_for(&missing), &filter_for(dir.path(), &[]));

        assert!(outcome.entries.is_empty());
        let error = outcome.error.expect("missing directory should record an error");
        assert_eq!(error.kind, io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_link_to_ancestor_is_guarded() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        std::os::unix::fs::symlink(&root, root.join("sub").join("loop")).unwrap();
        File::create(root.join("target.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("target.txt"), root.join("sub").join("file_link"))
            .unwrap();

        let mut request = request_for(&root.join("sub"));
        request.relative_path = PathBuf::from("sub");
        let outcome = FileSystemScanner::default().list_children(&request, &filter_for(&root, &[]));

        let looped = outcome.entries.iter().find(|e| e.name == "loop").unwrap();
        assert_eq!(looped.kind, NodeKind::Directory);
        assert!(!looped.eligible);
        assert!(looped.is_sealed());

        let file_link = outcome.entries.iter().find(|e| e.name == "file_link").unwrap();
        assert!(file_link.eligible);
        assert!(file_link.symlink);
        assert_eq!(file_link.kind, NodeKind::File);
    }

    #[test]
    fn test_job_runs_off_thread() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        File::create(root.join("a.txt")).unwrap();

        let filter = Arc::new(filter_for(&root, &[]));
        let job = ScanJob::new(request_for(&root), FileSystemScanner::default(), filter);
        let outcome = std::thread::spawn(move || job.run()).join().unwrap();

        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.node, NodeId(0));
    }
}
