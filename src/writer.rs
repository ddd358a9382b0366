/*!
 * XML writer for packed documents
 *
 * Output format:
 *
 * ```text
 * <packed_repository project="NAME">
 *   <file_summary>
 *     <purpose>...</purpose>
 *     <file_format>...</file_format>
 *     <usage_guidelines>...</usage_guidelines>
 *     <notes>...</notes>
 *     <metrics files="N" bytes="N" skipped="N"/>
 *   </file_summary>
 *   <directory_structure>one path per line</directory_structure>
 *   <files>
 *     <file path="src/main.rs"><![CDATA[raw content]]>
 *     </file>
 *     <file path="logo.bin" skipped="binary">reason</file>
 *   </files>
 * </packed_repository>
 * ```
 *
 * File content is carried verbatim in CDATA sections. A `]]>` inside the
 * content is split across two consecutive sections, so an XML reader
 * concatenating the CDATA of a `<file>` gets the original text back.
 * No timestamps or host details are written: the same selection renders to
 * the same bytes.
 */

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{RepoPackerError, Result};
use crate::packer::{EntryBody, PackedDocument, PackedEntry};
use crate::utils::format_file_size;

/// Renders [`PackedDocument`]s as XML-tagged text
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlWriter;

impl XmlWriter {
    pub fn new() -> Self {
        Self
    }

    /// Render the document to a string
    pub fn render(&self, doc: &PackedDocument) -> Result<String> {
        let mut xml_writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_document(doc, &mut xml_writer)?;
        String::from_utf8(xml_writer.into_inner())
            .map_err(|e| RepoPackerError::Writer(e.to_string()))
    }

    /// Render the document into a file
    pub fn write_to_file(&self, doc: &PackedDocument, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.render(doc)?.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn write_document<W: Write>(&self, doc: &PackedDocument, writer: &mut Writer<W>) -> io::Result<()> {
        let mut start_tag = BytesStart::new("packed_repository");
        start_tag.push_attribute(("project", doc.project.as_str()));
        writer.write_event(Event::Start(start_tag))?;

        self.write_summary(doc, writer)?;
        self.write_structure(doc, writer)?;

        writer.write_event(Event::Start(BytesStart::new("files")))?;
        for entry in &doc.entries {
            self.write_entry(entry, writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new("files")))?;

        writer.write_event(Event::End(BytesEnd::new("packed_repository")))?;
        Ok(())
    }

    fn write_summary<W: Write>(&self, doc: &PackedDocument, writer: &mut Writer<W>) -> io::Result<()> {
        writer.write_event(Event::Start(BytesStart::new("file_summary")))?;

        write_text_element(
            writer,
            "purpose",
            "This document contains a packed representation of selected repository files. \
             It is designed to be easily consumable by AI systems for analysis, code review, \
             or other automated processes.",
        )?;
        write_text_element(
            writer,
            "file_format",
            "1. This summary section\n\
             2. Directory structure of the selected files\n\
             3. The selected files, each a <file> element with the path (relative to the \
             project root) as an attribute and the full contents in CDATA, or a skipped \
             attribute and a reason when the contents were not included",
        )?;
        write_text_element(
            writer,
            "usage_guidelines",
            "- Treat this document as read-only; make changes in the original repository.\n\
             - Use the path attribute to distinguish between files.\n\
             - This document may contain sensitive information; handle it like the repository itself.",
        )?;
        write_text_element(
            writer,
            "notes",
            &format!(
                "- Files are selected by the user and filtered by .gitignore and default ignore patterns.\n\
                 - Binary files (by heuristic) are listed as skipped.\n\
                 - Files over {} are listed as skipped.",
                format_file_size(doc.size_limit)
            ),
        )?;

        let mut metrics = BytesStart::new("metrics");
        metrics.push_attribute(("files", doc.metrics.file_count.to_string().as_str()));
        metrics.push_attribute(("bytes", doc.metrics.total_bytes.to_string().as_str()));
        metrics.push_attribute(("skipped", doc.metrics.skipped_count.to_string().as_str()));
        writer.write_event(Event::Empty(metrics))?;

        writer.write_event(Event::End(BytesEnd::new("file_summary")))?;
        Ok(())
    }

    fn write_structure<W: Write>(&self, doc: &PackedDocument, writer: &mut Writer<W>) -> io::Result<()> {
        let listing = doc
            .entries
            .iter()
            .map(|e| e.relative_path.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        write_text_element(writer, "directory_structure", &listing)
    }

    fn write_entry<W: Write>(&self, entry: &PackedEntry, writer: &mut Writer<W>) -> io::Result<()> {
        let mut start_tag = BytesStart::new("file");
        start_tag.push_attribute(("path", entry.relative_path.as_str()));

        match &entry.body {
            EntryBody::Content(content) => {
                writer.write_event(Event::Start(start_tag))?;
                for section in cdata_sections(content) {
                    writer.write_event(Event::CData(BytesCData::new(section)))?;
                }
            }
            EntryBody::Skipped { reason, detail } => {
                let reason: &str = reason.as_ref();
                start_tag.push_attribute(("skipped", reason));
                writer.write_event(Event::Start(start_tag))?;
                writer.write_event(Event::Text(BytesText::new(detail)))?;
            }
        }

        writer.write_event(Event::End(BytesEnd::new("file")))?;
        Ok(())
    }
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Split content so that no section contains `]]>`
fn cdata_sections(content: &str) -> Vec<String> {
    let parts: Vec<&str> = content.split("]]>").collect();
    let last = parts.len() - 1;

    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut section = String::with_capacity(part.len() + 3);
            if i > 0 {
                section.push('>');
            }
            section.push_str(part);
            if i < last {
                section.push_str("]]");
            }
            section
        })
        .collect()
}
