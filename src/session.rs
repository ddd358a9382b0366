/*!
 * One opened project root
 *
 * A [`Session`] owns the selection tree of a root from the moment it is
 * opened until it is closed. Front ends drive it with [`Command`]s and ask
 * it for packed documents.
 */

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use tracing::info;

use crate::clipboard::Clipboard;
use crate::config::Config;
use crate::error::Result;
use crate::filter::IgnoreFilter;
use crate::packer::{OutputPacker, PackedDocument};
use crate::scanner::FileSystemScanner;
use crate::tree::SelectionTree;
use crate::types::{NodeId, Selection};
use crate::utils::to_slash_path;
use crate::writer::XmlWriter;

/// Selection and navigation requests from a front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Select every eligible file in the project
    SelectAllInProject,
    /// Clear the whole selection
    DeselectAllInProject,
    /// Select everything in a directory (a file means its directory)
    SelectContentOf(NodeId),
    /// Clear everything in a directory (a file means its directory)
    DeselectContentOf(NodeId),
    /// Toggle one file, or all of a directory
    ToggleSelect(NodeId),
    /// Expand or collapse a directory, toggle a file
    ToggleExpandOrSelect(NodeId),
    Expand(NodeId),
    Collapse(NodeId),
    /// List a directory again
    Refresh(NodeId),
}

/// An opened project root and its selection
#[derive(Debug)]
pub struct Session {
    config: Config,
    tree: SelectionTree,
    packer: OutputPacker,
    writer: XmlWriter,
}

impl Session {
    /// Open `config.root`
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let root = fs::canonicalize(&config.root)?;

        let mut ignore_patterns = config.ignore_patterns.clone();
        if let Some(pattern) = config
            .output_file
            .as_deref()
            .and_then(|output| output_ignore_pattern(&root, output))
        {
            ignore_patterns.push(pattern);
        }
        let filter_config = Config {
            ignore_patterns,
            ..config.clone()
        };

        let filter = Arc::new(IgnoreFilter::from_config(&root, &filter_config)?);
        let scanner = FileSystemScanner::new(config.name_order);
        let tree = SelectionTree::open(&root, filter, scanner)?;

        info!("Opened {}", root.display());
        Ok(Self {
            config,
            tree,
            packer: OutputPacker::new(),
            writer: XmlWriter::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Path {
        self.tree.root_path()
    }

    pub fn tree(&self) -> &SelectionTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SelectionTree {
        &mut self.tree
    }

    /// Report packing progress on `progress`
    pub fn set_progress(&mut self, progress: Arc<ProgressBar>) {
        self.packer = OutputPacker::new().with_progress(progress);
    }

    /// Apply a command; returns whether the selection changed
    pub fn execute(&mut self, command: Command) -> Result<bool> {
        let root = self.tree.root();
        let changed = match command {
            Command::SelectAllInProject => self.tree.set_all(root, Selection::Selected)?,
            Command::DeselectAllInProject => self.tree.set_all(root, Selection::Unselected)?,
            Command::SelectContentOf(id) => {
                let dir = self.content_target(id)?;
                self.tree.set_all(dir, Selection::Selected)?
            }
            Command::DeselectContentOf(id) => {
                let dir = self.content_target(id)?;
                self.tree.set_all(dir, Selection::Unselected)?
            }
            Command::ToggleSelect(id) => self.tree.toggle(id)?,
            Command::ToggleExpandOrSelect(id) => {
                let node = self.tree.node(id)?;
                if node.is_dir() {
                    let expanded = node.expanded;
                    self.tree.set_expanded(id, !expanded)?;
                    false
                } else {
                    self.tree.toggle(id)?
                }
            }
            Command::Expand(id) => {
                self.tree.set_expanded(id, true)?;
                false
            }
            Command::Collapse(id) => {
                self.tree.set_expanded(id, false)?;
                false
            }
            Command::Refresh(id) => {
                self.tree.refresh(id)?;
                false
            }
        };
        Ok(changed)
    }

    /// Directory a "content of" command applies to
    fn content_target(&self, id: NodeId) -> Result<NodeId> {
        let node = self.tree.node(id)?;
        Ok(match node.parent {
            Some(parent) if !node.is_dir() => parent,
            _ => id,
        })
    }

    /// Apply the configured selection: matching files, or the whole project
    pub fn apply_initial_selection(&mut self) -> Result<usize> {
        if self.config.select_patterns.is_empty() {
            self.execute(Command::SelectAllInProject)?;
            Ok(self.tree.selected_files().len())
        } else {
            let patterns = self.config.select_patterns.clone();
            Ok(self.tree.select_matching(&patterns)?)
        }
    }

    /// Pack the current selection
    pub fn pack(&mut self) -> PackedDocument {
        self.packer.pack(&mut self.tree)
    }

    /// Pack the current selection and render it
    pub fn render(&mut self) -> Result<(PackedDocument, String)> {
        let doc = self.pack();
        let text = self.render_document(&doc)?;
        Ok((doc, text))
    }

    pub fn render_document(&self, doc: &PackedDocument) -> Result<String> {
        self.writer.render(doc)
    }

    /// Render an already packed document into `path`
    pub fn write_output(&self, doc: &PackedDocument, path: &Path) -> Result<()> {
        self.writer.write_to_file(doc, path)?;
        info!("Wrote {} entries to {}", doc.entries.len(), path.display());
        Ok(())
    }

    /// Pack, render and copy to `clipboard`
    pub fn copy_packed(&mut self, clipboard: &dyn Clipboard) -> Result<PackedDocument> {
        let (doc, text) = self.render()?;
        clipboard.copy_to_clipboard(&text)?;
        info!(
            "{} files packed and copied to clipboard",
            doc.metrics.file_count
        );
        Ok(doc)
    }

    /// Tear the session down
    pub fn close(self) {
        info!("Closed {}", self.root().display());
    }
}

/// Anchored ignore pattern for an output file that lives inside `root`
fn output_ignore_pattern(root: &Path, output: &Path) -> Option<String> {
    let absolute: PathBuf = if output.is_absolute() {
        output.to_path_buf()
    } else {
        env::current_dir().ok()?.join(output)
    };
    let parent = absolute.parent()?.canonicalize().ok()?;
    let file = parent.join(absolute.file_name()?);
    let relative = file.strip_prefix(root).ok()?;
    Some(format!("/{}", escape_pattern(&to_slash_path(relative))))
}

/// Escape a literal path so gitignore matching reads no glob or prefix syntax in it
fn escape_pattern(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if matches!(c, '\\' | '[' | ']' | '*' | '?' | '!' | '#' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
