/*!
 * Reporting for pack runs
 *
 * Renders a summary of a packed document as console tables with the
 * tabled library.
 */

use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::packer::{EntryBody, PackedDocument};
use crate::utils::format_file_size;

/// Files listed individually before the table switches to the largest ones
const FULL_LISTING_LIMIT: usize = 15;
/// Files shown when only the largest are listed
const TOP_FILES: usize = 10;

/// Statistics for one pack run
#[derive(Debug, Clone)]
pub struct PackReport {
    /// Where the output went
    pub output: String,
    /// Time taken to select, pack and write
    pub duration: Duration,
    /// Selected files, in document order
    pub files: Vec<FileReportInfo>,
    /// Files whose content was included
    pub files_packed: usize,
    /// Selected files that were skipped
    pub files_skipped: usize,
    /// Bytes of included content
    pub total_bytes: u64,
    /// Characters of included content
    pub total_chars: usize,
}

/// One selected file in the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReportInfo {
    pub path: String,
    /// "packed" or the skip reason
    pub status: String,
    /// Characters of included content
    pub chars: usize,
}

impl PackReport {
    /// Build a report from a packed document
    pub fn from_document(doc: &PackedDocument, output: impl Into<String>, duration: Duration) -> Self {
        let files: Vec<FileReportInfo> = doc
            .entries
            .iter()
            .map(|entry| match &entry.body {
                EntryBody::Content(content) => FileReportInfo {
                    path: entry.relative_path.clone(),
                    status: "packed".to_string(),
                    chars: content.chars().count(),
                },
                EntryBody::Skipped { reason, .. } => FileReportInfo {
                    path: entry.relative_path.clone(),
                    status: reason.to_string(),
                    chars: 0,
                },
            })
            .collect();

        Self {
            output: output.into(),
            duration,
            total_chars: files.iter().map(|f| f.chars).sum(),
            files,
            files_packed: doc.metrics.file_count,
            files_skipped: doc.metrics.skipped_count,
            total_bytes: doc.metrics.total_bytes,
        }
    }

    /// Rough LLM token count, four characters per token
    pub fn estimated_tokens(&self) -> usize {
        self.total_chars / 4
    }
}

/// Report generator for pack runs
#[derive(Debug, Default)]
pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// Generate the report text
    pub fn generate_report(&self, report: &PackReport) -> String {
        let files_title = if report.files.len() > FULL_LISTING_LIMIT {
            format!("📋  TOP {} LARGEST FILES BY CHARACTER COUNT", TOP_FILES)
        } else {
            "📋  PACKED FILES".to_string()
        };

        format!(
            "{}\n{}\n\n{}\n{}",
            files_title,
            self.create_files_table(report),
            "✅  PACK COMPLETE",
            self.create_summary_table(report)
        )
    }

    /// Print the report to stderr
    pub fn print_report(&self, report: &PackReport) {
        eprintln!("\n{}", self.generate_report(report));
    }

    fn create_summary_table(&self, report: &PackReport) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: &'static str,

            #[tabled(rename = "Value")]
            value: String,
        }

        let rows = vec![
            SummaryRow {
                key: "📂 Output",
                value: report.output.clone(),
            },
            SummaryRow {
                key: "⏱️ Process Time",
                value: format!("{:.4?}", report.duration),
            },
            SummaryRow {
                key: "📄 Files Packed",
                value: format_number(report.files_packed),
            },
            SummaryRow {
                key: "⏭️ Files Skipped",
                value: format_number(report.files_skipped),
            },
            SummaryRow {
                key: "💾 Total Size",
                value: format_file_size(report.total_bytes),
            },
            SummaryRow {
                key: "📦 LLM Tokens",
                value: format!("{} tokens (estimated)", format_number(report.estimated_tokens())),
            },
        ];

        styled(Table::new(rows))
    }

    fn create_files_table(&self, report: &PackReport) -> String {
        #[derive(Tabled)]
        struct FileRow {
            #[tabled(rename = "File Path")]
            path: String,

            #[tabled(rename = "Status")]
            status: String,

            #[tabled(rename = "Est. Tokens")]
            tokens: String,
        }

        let mut files: Vec<&FileReportInfo> = report.files.iter().collect();
        if files.len() > FULL_LISTING_LIMIT {
            files.sort_by(|a, b| b.chars.cmp(&a.chars));
            files.truncate(TOP_FILES);
        }

        let rows: Vec<FileRow> = files
            .into_iter()
            .map(|info| FileRow {
                path: truncate_path(&info.path, 60),
                status: info.status.clone(),
                tokens: format_number(info.chars / 4),
            })
            .collect();

        styled(Table::new(rows))
    }
}

fn styled(mut table: Table) -> String {
    table
        .with(Style::rounded())
        .with(Padding::new(1, 1, 0, 0))
        .with(Modify::new(Columns::new(..)).with(Alignment::left()));
    table.to_string()
}

/// Format a number with K/M suffixes
fn format_number(num: usize) -> String {
    if num >= 1_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else if num >= 1_000 {
        format!("{:.1}K", num as f64 / 1_000.0)
    } else {
        num.to_string()
    }
}

/// Keep the trailing path segments that fit in `max_len`
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let mut kept = Vec::new();
    let mut len = 3;
    for part in path.rsplit('/') {
        let part_len = part.chars().count() + 1;
        if len + part_len > max_len {
            break;
        }
        kept.push(part);
        len += part_len;
    }

    if kept.is_empty() {
        let tail: String = {
            let chars: Vec<char> = path.chars().collect();
            chars[chars.len().saturating_sub(max_len.saturating_sub(3))..].iter().collect()
        };
        return format!("...{}", tail);
    }

    kept.reverse();
    format!(".../{}", kept.join("/"))
}
