/*!
 * Tri-state selection tree
 *
 * Nodes live in a flat arena and refer to each other by [`NodeId`]. Each
 * directory owns the ordered list of its children; the `parent` link is only
 * used to walk upward when recomputing selection after a change.
 *
 * A directory is `Selected` when all of its eligible children are, and there
 * is at least one; `Unselected` when none of them are selected (or there are
 * none); `Partial` otherwise. Ineligible nodes stay `Unselected` and are
 * skipped by that computation.
 */

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use glob_match::glob_match;
use tracing::debug;

use crate::error::{RepoPackerError, Result, TreeError};
use crate::filter::IgnoreFilter;
use crate::scanner::{FileSystemScanner, ScanJob, ScanOutcome, ScanRequest};
use crate::types::{Classification, Node, NodeId, NodeKind, Selection};
use crate::utils::to_slash_path;

/// What happened to a scan outcome handed to [`SelectionTree::apply_scan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanApplied {
    /// Children were installed
    Applied,
    /// The directory was refreshed, detached or already loaded meanwhile
    Discarded,
}

/// In-memory tree of one opened root with its selection state
#[derive(Debug)]
pub struct SelectionTree {
    nodes: Vec<Node>,
    root: NodeId,
    filter: Arc<IgnoreFilter>,
    scanner: FileSystemScanner,
}

impl SelectionTree {
    /// Open `root` and list its direct children
    pub fn open(
        root: impl AsRef<Path>,
        filter: Arc<IgnoreFilter>,
        scanner: FileSystemScanner,
    ) -> Result<Self> {
        let path = fs::canonicalize(root.as_ref())?;
        if !path.is_dir() {
            return Err(RepoPackerError::PathNotFound(path.display().to_string()));
        }

        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let root_node = Node {
            path,
            relative_path: PathBuf::new(),
            name,
            kind: NodeKind::Directory,
            size: 0,
            parent: None,
            children: Vec::new(),
            loaded: false,
            selection: Selection::Unselected,
            eligible: true,
            classification: None,
            symlink: false,
            via_link: false,
            scan_error: None,
            expanded: true,
            generation: 0,
            detached: false,
        };

        let mut tree = Self {
            nodes: vec![root_node],
            root: NodeId::new(0),
            filter,
            scanner,
        };
        tree.ensure_loaded(tree.root)?;
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_path(&self) -> &Path {
        &self.nodes[self.root.idx()].path
    }

    pub fn filter(&self) -> &Arc<IgnoreFilter> {
        &self.filter
    }

    /// Look up a live node
    pub fn node(&self, id: NodeId) -> std::result::Result<&Node, TreeError> {
        let node = self.nodes.get(id.idx()).ok_or(TreeError::UnknownNode(id))?;
        if node.detached {
            return Err(TreeError::Detached(id));
        }
        Ok(node)
    }

    pub fn selection(&self, id: NodeId) -> std::result::Result<Selection, TreeError> {
        self.node(id).map(|n| n.selection)
    }

    /// Children of a directory in display order (empty until loaded)
    pub fn children(&self, id: NodeId) -> std::result::Result<&[NodeId], TreeError> {
        self.node(id).map(|n| n.children.as_slice())
    }

    /// Live nodes, depth-first, directories before files
    pub fn walk(&self) -> Vec<NodeId> {
        self.walk_from(self.root)
    }

    fn walk_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.idx()].children.iter().rev().copied());
        }
        order
    }

    /// Selected, eligible files in packing order
    pub fn selected_files(&self) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|id| {
                let node = &self.nodes[id.idx()];
                node.is_file() && node.eligible && node.selection == Selection::Selected
            })
            .collect()
    }

    /// Find a node by path relative to the root, scanning directories on the way
    pub fn locate(&mut self, relative: impl AsRef<Path>) -> Result<Option<NodeId>> {
        let mut current = self.root;
        for component in relative.as_ref().components() {
            let name = match component {
                Component::Normal(name) => name.to_string_lossy(),
                Component::CurDir => continue,
                _ => return Ok(None),
            };
            if !self.nodes[current.idx()].is_dir() {
                return Ok(None);
            }
            self.ensure_loaded(current)?;
            let found = self.nodes[current.idx()]
                .children
                .iter()
                .copied()
                .find(|child| self.nodes[child.idx()].name == name);
            match found {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    //--------------------------------------------------------------------
    // Scanning
    //--------------------------------------------------------------------

    fn scan_request(&self, id: NodeId) -> ScanRequest {
        let node = &self.nodes[id.idx()];
        ScanRequest {
            node: id,
            generation: node.generation,
            path: node.path.clone(),
            relative_path: node.relative_path.clone(),
            eligible: node.eligible,
            via_link: node.via_link,
        }
    }

    /// Prepare a listing of `id` to run elsewhere
    ///
    /// Returns `None` for files and directories that are already loaded.
    pub fn scan_job(&self, id: NodeId) -> std::result::Result<Option<ScanJob>, TreeError> {
        let node = self.node(id)?;
        if !node.is_dir() || node.loaded {
            return Ok(None);
        }
        Ok(Some(ScanJob::new(
            self.scan_request(id),
            self.scanner.clone(),
            Arc::clone(&self.filter),
        )))
    }

    /// Install the result of a [`ScanJob`]
    ///
    /// Stale outcomes (the directory was refreshed, detached, or loaded by a
    /// synchronous scan in the meantime) are discarded.
    pub fn apply_scan(&mut self, outcome: ScanOutcome) -> std::result::Result<ScanApplied, TreeError> {
        let node = self
            .nodes
            .get(outcome.node.idx())
            .ok_or(TreeError::UnknownNode(outcome.node))?;

        if node.detached || node.loaded || node.generation != outcome.generation {
            debug!("Discarding stale listing of {}", node.path.display());
            return Ok(ScanApplied::Discarded);
        }

        self.install(outcome);
        Ok(ScanApplied::Applied)
    }

    /// Scan a directory now if its children are not loaded yet
    pub fn ensure_loaded(&mut self, id: NodeId) -> std::result::Result<(), TreeError> {
        let node = self.node(id)?;
        if !node.is_dir() || node.loaded {
            return Ok(());
        }
        let outcome = self.scanner.list_children(&self.scan_request(id), &self.filter);
        self.install(outcome);
        Ok(())
    }

    fn install(&mut self, outcome: ScanOutcome) {
        let parent = outcome.node;
        let mut children = Vec::with_capacity(outcome.entries.len());

        for entry in outcome.entries {
            let sealed = entry.is_sealed();
            let id = NodeId::new(self.nodes.len());
            self.nodes.push(Node {
                loaded: entry.kind == NodeKind::File || sealed,
                path: entry.path,
                relative_path: entry.relative_path,
                name: entry.name,
                kind: entry.kind,
                size: entry.size,
                parent: Some(parent),
                children: Vec::new(),
                selection: Selection::Unselected,
                eligible: entry.eligible,
                classification: entry.classification,
                symlink: entry.symlink,
                via_link: entry.via_link,
                scan_error: None,
                expanded: false,
                generation: 0,
                detached: false,
            });
            children.push(id);
        }

        let node = &mut self.nodes[parent.idx()];
        node.children = children;
        node.loaded = true;
        node.scan_error = outcome.error;
    }

    /// Load every eligible directory below the root
    pub fn load_all(&mut self) -> std::result::Result<(), TreeError> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.idx()];
            if !node.is_dir() || !node.eligible {
                continue;
            }
            self.ensure_loaded(id)?;
            stack.extend(self.nodes[id.idx()].children.iter().copied());
        }
        Ok(())
    }

    /// Drop the children of a directory so they are listed again
    ///
    /// Any listing of the old generation still in flight is discarded when it
    /// arrives. Files that were selected and still exist are selected again.
    pub fn refresh(&mut self, id: NodeId) -> Result<()> {
        if !self.node(id)?.is_dir() {
            return Ok(());
        }

        let previously_selected: Vec<PathBuf> = self
            .walk_from(id)
            .into_iter()
            .filter(|n| {
                let node = &self.nodes[n.idx()];
                node.is_file() && node.selection == Selection::Selected
            })
            .map(|n| self.nodes[n.idx()].relative_path.clone())
            .collect();

        for descendant in self.walk_from(id).into_iter().skip(1) {
            self.nodes[descendant.idx()].release();
        }
        self.filter.forget_ignore_files(&self.nodes[id.idx()].path);

        let node = &mut self.nodes[id.idx()];
        node.children.clear();
        node.loaded = false;
        node.scan_error = None;
        node.generation += 1;
        node.selection = Selection::Unselected;
        self.recompute_ancestors(id)?;

        for relative in previously_selected {
            if let Some(file) = self.locate(&relative)? {
                let node = &mut self.nodes[file.idx()];
                if node.is_file() && node.eligible {
                    node.selection = Selection::Selected;
                    self.recompute_ancestors(file)?;
                }
            }
        }

        debug!("Refreshed {}", self.nodes[id.idx()].path.display());
        Ok(())
    }

    //--------------------------------------------------------------------
    // Selection
    //--------------------------------------------------------------------

    /// Flip a file, or select/clear everything inside a directory
    ///
    /// A directory whose eligible files are all selected is cleared;
    /// otherwise everything in it is selected. Ineligible nodes are left alone.
    /// Returns whether any selection changed.
    pub fn toggle(&mut self, id: NodeId) -> std::result::Result<bool, TreeError> {
        let node = self.node(id)?;
        if !node.eligible {
            return Ok(false);
        }

        match node.kind {
            NodeKind::File => {
                let next = match node.selection {
                    Selection::Selected => Selection::Unselected,
                    _ => Selection::Selected,
                };
                self.nodes[id.idx()].selection = next;
                self.recompute_ancestors(id)?;
                Ok(true)
            }
            NodeKind::Directory => {
                let target = if self.all_files_selected(id)? {
                    Selection::Unselected
                } else {
                    Selection::Selected
                };
                self.set_all(id, target)
            }
        }
    }

    /// Whether every eligible file below `id` is selected, false when there are none
    ///
    /// Directories without eligible files never count against it, so a
    /// subtree holding empty or fully ignored directories still clears on the
    /// second toggle.
    fn all_files_selected(&mut self, id: NodeId) -> std::result::Result<bool, TreeError> {
        let mut any = false;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current.idx()];
            if !node.eligible {
                continue;
            }
            if node.is_file() {
                if node.selection != Selection::Selected {
                    return Ok(false);
                }
                any = true;
                continue;
            }
            self.ensure_loaded(current)?;
            stack.extend(self.nodes[current.idx()].children.iter().copied());
        }
        Ok(any)
    }

    /// Set every eligible node under `id` (inclusive) to `state`
    ///
    /// Unloaded directories are scanned first. Directories without eligible
    /// children end up `Unselected` whatever the target.
    pub fn set_all(&mut self, id: NodeId, state: Selection) -> std::result::Result<bool, TreeError> {
        if state == Selection::Partial {
            return Err(TreeError::PartialTarget);
        }
        if !self.node(id)?.eligible {
            return Ok(false);
        }

        let changed = self.set_subtree(id, state)?;
        self.recompute_ancestors(id)?;
        Ok(changed)
    }

    fn set_subtree(&mut self, id: NodeId, state: Selection) -> std::result::Result<bool, TreeError> {
        if !self.nodes[id.idx()].eligible {
            return Ok(false);
        }

        if self.nodes[id.idx()].is_file() {
            let node = &mut self.nodes[id.idx()];
            let changed = node.selection != state;
            node.selection = state;
            return Ok(changed);
        }

        self.ensure_loaded(id)?;
        let mut changed = false;
        for child in self.nodes[id.idx()].children.clone() {
            changed |= self.set_subtree(child, state)?;
        }

        let derived = self.derive_selection(id);
        let node = &mut self.nodes[id.idx()];
        changed |= node.selection != derived;
        node.selection = derived;
        Ok(changed)
    }

    /// Selection implied by the direct eligible children of a directory
    fn derive_selection(&self, id: NodeId) -> Selection {
        let mut any = false;
        let mut all_selected = true;
        let mut none_selected = true;

        for child in &self.nodes[id.idx()].children {
            let child = &self.nodes[child.idx()];
            if !child.eligible {
                continue;
            }
            any = true;
            match child.selection {
                Selection::Selected => none_selected = false,
                Selection::Unselected => all_selected = false,
                Selection::Partial => {
                    all_selected = false;
                    none_selected = false;
                }
            }
        }

        if !any || none_selected {
            Selection::Unselected
        } else if all_selected {
            Selection::Selected
        } else {
            Selection::Partial
        }
    }

    /// Recompute the ancestors of `id` from their children, bottom-up
    ///
    /// Stops at the first ancestor whose state does not change.
    pub fn recompute_ancestors(&mut self, id: NodeId) -> std::result::Result<(), TreeError> {
        let mut current = self.node(id)?.parent;
        while let Some(parent) = current {
            let derived = self.derive_selection(parent);
            let node = &mut self.nodes[parent.idx()];
            if node.selection == derived {
                break;
            }
            node.selection = derived;
            current = node.parent;
        }
        Ok(())
    }

    /// Select every eligible file whose relative path matches one of `patterns`
    ///
    /// Loads the whole eligible tree. Returns the number of files matched.
    pub fn select_matching<S: AsRef<str>>(&mut self, patterns: &[S]) -> std::result::Result<usize, TreeError> {
        self.load_all()?;

        let matches: Vec<NodeId> = self
            .walk()
            .into_iter()
            .filter(|id| {
                let node = &self.nodes[id.idx()];
                if !node.is_file() || !node.eligible {
                    return false;
                }
                let relative = to_slash_path(&node.relative_path);
                patterns.iter().any(|p| glob_match(p.as_ref(), &relative))
            })
            .collect();

        for id in &matches {
            self.nodes[id.idx()].selection = Selection::Selected;
            self.recompute_ancestors(*id)?;
        }
        Ok(matches.len())
    }

    //--------------------------------------------------------------------
    // Expansion and classification
    //--------------------------------------------------------------------

    /// Expand (scanning if needed) or collapse a directory
    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) -> std::result::Result<(), TreeError> {
        if !self.node(id)?.is_dir() {
            return Ok(());
        }
        if expanded {
            self.ensure_loaded(id)?;
        }
        self.nodes[id.idx()].expanded = expanded;
        Ok(())
    }

    /// Classification of a file, computed on first use and cached
    pub fn classify(&mut self, id: NodeId) -> std::result::Result<Option<Classification>, TreeError> {
        let node = self.node(id)?;
        if !node.is_file() {
            return Ok(None);
        }
        if let Some(cached) = node.classification {
            return Ok(Some(cached));
        }

        let classification = self.filter.classify(&node.path, node.size);
        debug!("Classified {} as {}", node.path.display(), classification);
        self.nodes[id.idx()].classification = Some(classification);
        Ok(Some(classification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    #[test]
    fn test_refresh_releases_detached_nodes() {
        let temp_dir = tempdir().unwrap();
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("docs").join("a.txt"), "a").unwrap();
        fs::write(root.join("docs").join("b.txt"), "b").unwrap();

        let config = Config {
            root: root.clone(),
            ..Config::default()
        };
        let filter = Arc::new(IgnoreFilter::from_config(&root, &config).unwrap());
        let mut tree =
            SelectionTree::open(&root, filter, FileSystemScanner::new(config.name_order)).unwrap();
        let docs = tree.locate("docs").unwrap().unwrap();
        let a = tree.locate("docs/a.txt").unwrap().unwrap();
        tree.classify(a).unwrap();
        tree.refresh(docs).unwrap();

        let tombstone = &tree.nodes[a.idx()];
        assert!(tombstone.detached);
        assert!(tombstone.path.as_os_str().is_empty());
        assert!(tombstone.name.is_empty());
        assert!(tombstone.classification.is_none());
        assert_eq!(tree.node(a).unwrap_err(), TreeError::Detached(a));

        // Ids issued after the refresh never reuse a tombstone slot
        let fresh = tree.locate("docs/a.txt").unwrap().unwrap();
        assert_ne!(fresh, a);
        assert_eq!(tree.node(fresh).unwrap().name, "a.txt");
    }
}
