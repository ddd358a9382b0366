/*!
 * repopacker - Pack selected repository files into one document for LLM context
 *
 * A project root is opened as a lazily loaded selection tree. Files are
 * filtered through ignore rules and binary/size checks, selected with
 * tri-state directory semantics, and packed into a single XML-tagged
 * document.
 */

pub mod clipboard;
pub mod config;
pub mod error;
pub mod filter;
pub mod history;
pub mod packer;
pub mod report;
pub mod scanner;
pub mod session;
pub mod tree;
pub mod types;
pub mod utils;
pub mod writer;


// Re-export main components for easier access
pub use config::Config;
pub use error::{RepoPackerError, Result, ScanError, TreeError};
pub use filter::{IgnoreFilter, IgnoreRuleSet};
pub use history::{HistoryStore, RecentHistoryEntry};
pub use packer::{EntryBody, OutputPacker, PackedDocument, PackedEntry};
pub use report::{PackReport, Reporter};
pub use scanner::{FileSystemScanner, ScanJob, ScanOutcome};
pub use session::{Command, Session};
pub use tree::{ScanApplied, SelectionTree};
pub use types::{Classification, NameOrder, Node, NodeId, NodeKind, Selection, SkipReason};
pub use utils::format_file_size;
pub use writer::XmlWriter;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
