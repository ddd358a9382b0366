/*!
 * Configuration handling for repopacker
 */

use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

use crate::ensure;
use crate::error::Result;
use crate::history::DEFAULT_CAPACITY;
use crate::types::NameOrder;

/// Files above this size are never packed (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Bytes read from each file to decide text versus binary
pub const DEFAULT_SAMPLE_SIZE: usize = 8192;

/// Command-line arguments for repopacker
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "repopacker",
    version = env!("CARGO_PKG_VERSION"),
    about = "Pack selected repository files into a single AI-friendly document",
    long_about = "Opens a directory, selects files (the whole project unless --select is given), \
                  filters them through ignore rules and binary/size checks, and packs their \
                  contents into one XML-tagged document for use as LLM context."
)]
pub struct Args {
    /// Project directory to open
    #[clap(default_value = ".")]
    pub path: String,

    /// Write the packed document to this file instead of stdout
    #[clap(short, long)]
    pub output: Option<String>,

    /// Comma-separated glob patterns of files to select (default: the whole project)
    #[clap(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Comma-separated gitignore-style patterns to ignore in addition to the defaults
    #[clap(long, value_delimiter = ',')]
    pub ignore_patterns: Vec<String>,

    /// Respect .gitignore files (default: true)
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub respect_gitignore: bool,

    /// Largest file, in bytes, whose content is packed
    #[clap(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// How sibling names are ordered
    #[clap(long, value_enum, default_value_t = NameOrder::Host)]
    pub name_order: NameOrder,

    /// Location of the recent projects history
    #[clap(long)]
    pub history_file: Option<String>,

    /// Do not read or update the recent projects history
    #[clap(long)]
    pub no_history: bool,

    /// List recently opened projects and exit
    #[clap(long)]
    pub recent: bool,

    /// Copy output to clipboard
    #[clap(long, help = "Copy output to system clipboard")]
    pub clip: bool,

    /// Do not print the pack report
    #[clap(short, long)]
    pub quiet: bool,

    /// Log progress details to stderr
    #[clap(short, long)]
    pub verbose: bool,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Project root to open
    pub root: PathBuf,

    /// Output file path (stdout when absent)
    pub output_file: Option<PathBuf>,

    /// Glob patterns selecting files (whole project when empty)
    pub select_patterns: Vec<String>,

    /// Extra ignore patterns
    pub ignore_patterns: Vec<String>,

    /// Whether to respect .gitignore files
    pub respect_gitignore: bool,

    /// Size threshold for packing content
    pub max_file_size: u64,

    /// Prefix length used for binary detection
    pub sample_size: usize,

    /// Sibling ordering policy
    pub name_order: NameOrder,

    /// History file (None disables persistence)
    pub history_file: Option<PathBuf>,

    /// Entries kept in the history
    pub history_capacity: usize,

    /// Copy output to clipboard
    pub clip: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            output_file: None,
            select_patterns: Vec::new(),
            ignore_patterns: Vec::new(),
            respect_gitignore: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            sample_size: DEFAULT_SAMPLE_SIZE,
            name_order: NameOrder::Host,
            history_file: None,
            history_capacity: DEFAULT_CAPACITY,
            clip: false,
        }
    }
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Self {
        let history_file = if args.no_history {
            None
        } else {
            args.history_file
                .map(PathBuf::from)
                .or_else(default_history_file)
        };

        Self {
            root: PathBuf::from(args.path),
            output_file: args.output.map(PathBuf::from),
            select_patterns: args.select,
            ignore_patterns: args.ignore_patterns,
            respect_gitignore: args.respect_gitignore,
            max_file_size: args.max_file_size,
            name_order: args.name_order,
            history_file,
            clip: args.clip,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.root.is_dir(),
            PathNotFound,
            "Project directory not found: {}",
            self.root.display()
        );

        if let Some(parent) = self.output_file.as_ref().and_then(|p| p.parent()) {
            ensure!(
                parent.as_os_str().is_empty() || parent.is_dir(),
                PathNotFound,
                "Output directory not found: {}",
                parent.display()
            );
        }

        ensure!(
            self.history_capacity > 0,
            Config,
            "History capacity must be at least 1"
        );
        ensure!(self.sample_size > 0, Config, "Sample size must be at least 1");

        Ok(())
    }
}

/// `<data dir>/repopacker/recent.json`
pub fn default_history_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("repopacker").join("recent.json"))
}
