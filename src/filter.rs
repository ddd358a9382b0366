/*!
 * Ignore rules and file classification
 *
 * Path rules follow gitignore semantics and are matched with the `ignore`
 * crate's gitignore matcher. Rules are layered: the built-in defaults and
 * user patterns form the base layer rooted at the packing root, and every
 * `.gitignore` found while scanning adds a layer scoped to its directory.
 * Layers are consulted from the shallowest to the deepest directory and the
 * last one with a verdict decides.
 */

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::types::Classification;
use crate::utils::DEFAULT_IGNORE;

/// Name of per-directory ignore files
pub const IGNORE_FILE_NAME: &str = ".gitignore";

/// Control bytes at or above this share of the sample mark a file binary
const BINARY_RATIO: f32 = 0.1;

/// Ordered, layered gitignore rules rooted at the packing root
#[derive(Debug, Clone)]
pub struct IgnoreRuleSet {
    root: PathBuf,
    base: Gitignore,
    nested: BTreeMap<PathBuf, Gitignore>,
}

impl IgnoreRuleSet {
    /// Build the base layer from patterns, in order
    pub fn from_patterns<I, S>(root: impl Into<PathBuf>, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = root.into();
        let mut builder = GitignoreBuilder::new(&root);
        for pattern in patterns {
            builder.add_line(None, pattern.as_ref())?;
        }

        Ok(Self {
            base: builder.build()?,
            root,
            nested: BTreeMap::new(),
        })
    }

    /// Base layer made of the defaults followed by `extra`
    pub fn with_defaults<S: AsRef<str>>(root: impl Into<PathBuf>, extra: &[S]) -> Result<Self> {
        let patterns = DEFAULT_IGNORE
            .iter()
            .map(|p| p.to_string())
            .chain(extra.iter().map(|p| p.as_ref().to_string()));
        Self::from_patterns(root, patterns)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add rules scoped to `dir`'s subtree. Replaces any layer already there.
    pub fn add_layer(&mut self, dir: impl Into<PathBuf>, rules: Gitignore) {
        self.nested.insert(dir.into(), rules);
    }

    pub fn has_layer(&self, dir: &Path) -> bool {
        self.nested.contains_key(dir)
    }

    /// Drop the layers of `dir` and every directory below it
    pub fn remove_layers_under(&mut self, dir: &Path) -> usize {
        let before = self.nested.len();
        self.nested.retain(|layer, _| !layer.starts_with(dir));
        before - self.nested.len()
    }

    /// Whether `path` is excluded by the rules
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let mut ignored = verdict(self.base.matched(path, is_dir)).unwrap_or(false);

        // BTreeMap orders ancestors before their descendants
        for (dir, rules) in &self.nested {
            if path == dir || !path.starts_with(dir) {
                continue;
            }
            if let Some(v) = verdict(rules.matched(path, is_dir)) {
                ignored = v;
            }
        }

        ignored
    }
}

fn verdict<T>(m: Match<T>) -> Option<bool> {
    match m {
        Match::None => None,
        Match::Ignore(_) => Some(true),
        Match::Whitelist(_) => Some(false),
    }
}

/// Decides eligibility and classifies files
///
/// Shared between the tree and scan jobs running on other threads; the
/// nested layers are behind a lock so jobs can install them.
#[derive(Debug)]
pub struct IgnoreFilter {
    rules: RwLock<IgnoreRuleSet>,
    respect_gitignore: bool,
    max_file_size: u64,
    sample_size: usize,
}

impl IgnoreFilter {
    pub fn new(rules: IgnoreRuleSet, max_file_size: u64, sample_size: usize) -> Self {
        Self {
            rules: RwLock::new(rules),
            respect_gitignore: true,
            max_file_size,
            sample_size,
        }
    }

    /// Build the filter for `root` from configuration
    pub fn from_config(root: &Path, config: &Config) -> Result<Self> {
        let rules = IgnoreRuleSet::with_defaults(root, &config.ignore_patterns)?;
        let mut filter = Self::new(rules, config.max_file_size, config.sample_size);
        filter.respect_gitignore = config.respect_gitignore;
        Ok(filter)
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Whether the node at `path` may take part in selection and packing
    pub fn is_eligible(&self, path: &Path, is_dir: bool) -> bool {
        !self.rules.read().is_ignored(path, is_dir)
    }

    /// Load `dir/.gitignore` as a layer for that subtree
    ///
    /// Does nothing when gitignore files are disabled, the file is absent or
    /// the layer is already present. Invalid lines are logged and skipped.
    pub fn load_ignore_file(&self, dir: &Path) {
        if !self.respect_gitignore || self.rules.read().has_layer(dir) {
            return;
        }

        let file = dir.join(IGNORE_FILE_NAME);
        if !file.is_file() {
            return;
        }

        let (rules, err) = Gitignore::new(&file);
        if let Some(err) = err {
            warn!("Problem parsing {}: {}", file.display(), err);
        }
        debug!(
            "Loaded {} rules from {}",
            rules.num_ignores() + rules.num_whitelists(),
            file.display()
        );
        self.rules.write().add_layer(dir, rules);
    }

    /// Forget the `.gitignore` layers loaded for `dir` and its subdirectories
    ///
    /// They are read again from disk the next time those directories are listed.
    pub fn forget_ignore_files(&self, dir: &Path) {
        let removed = self.rules.write().remove_layers_under(dir);
        if removed > 0 {
            debug!("Dropped {} ignore layers under {}", removed, dir.display());
        }
    }

    /// Classify from metadata size and a prefix of the content
    pub fn classify_sample(&self, size: u64, sample: &[u8]) -> Classification {
        if size > self.max_file_size {
            return Classification::TooLarge;
        }
        if sample.is_empty() {
            return Classification::Text;
        }
        if sample.contains(&0) {
            return Classification::Binary;
        }

        let control = sample
            .iter()
            .filter(|&&b| b < 9 || (b > 13 && b < 32 && b != 27))
            .count();
        if control as f32 / sample.len() as f32 >= BINARY_RATIO {
            Classification::Binary
        } else {
            Classification::Text
        }
    }

    /// Classify a file, reading at most the sample size from it
    ///
    /// Never fails; I/O errors become [`Classification::Unreadable`].
    pub fn classify(&self, path: &Path, size: u64) -> Classification {
        if size > self.max_file_size {
            return Classification::TooLarge;
        }

        match read_sample(path, self.sample_size) {
            Ok(sample) => self.classify_sample(size, &sample),
            Err(e) => {
                debug!("Cannot sample {}: {}", path.display(), e);
                Classification::Unreadable
            }
        }
    }
}

fn read_sample(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(limit);
    file.take(limit as u64).read_to_end(&mut sample)?;
    Ok(sample)
}
