//! Passes run over a freshly rendered page before embeds are resolved.
//!
//! Order matters: paragraph cleanup first, then title and page metadata
//! extraction. Embedded fragments are spliced in afterwards and never go
//! through these passes.

use super::{Document, Element, Node};
use crate::types::{Metadata, MetadataError};

/// What post-processing learned about a page.
#[derive(Debug, Default)]
pub struct PageInfo {
    /// Text of the first `<h1>`, if any and non-empty.
    pub first_title: Option<String>,
    /// Mapping parsed from the first comment; empty when absent or malformed.
    pub page: Metadata,
    /// Why the first comment could not be used as page metadata.
    pub page_error: Option<MetadataError>,
}

/// Run every pass over `doc`.
pub fn process(doc: &mut Document) -> PageInfo {
    clean_paragraphs(&mut doc.children);
    let first_title = detect_title(doc);
    let (page, page_error) = match page_metadata(doc) {
        Some(Ok(page)) => (page, None),
        Some(Err(err)) => (Metadata::default(), Some(err)),
        None => (Metadata::default(), None),
    };
    PageInfo {
        first_title,
        page,
        page_error,
    }
}

/// Unwrap every `<p>` that has no non-whitespace direct text: its children
/// take its place among its siblings, in order.
///
/// Runs bottom-up, so a paragraph emptied by unwrapping its own children is
/// judged on what it contains afterwards. Idempotent.
pub fn clean_paragraphs(nodes: &mut Vec<Node>) {
    let original = std::mem::take(nodes);
    for node in original {
        match node {
            Node::Element(mut element) => {
                clean_paragraphs(&mut element.children);
                if is_decorative_paragraph(&element) {
                    nodes.extend(element.children);
                } else {
                    nodes.push(Node::Element(element));
                }
            }
            other => nodes.push(other),
        }
    }
}

fn is_decorative_paragraph(element: &Element) -> bool {
    element.name == "p" && !element.has_direct_text()
}

/// Decoded, trimmed text of the first `<h1>`.
pub fn detect_title(doc: &Document) -> Option<String> {
    let heading = doc.find_element(|element| element.name == "h1")?;
    let text = heading.text_content();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Parse the first comment as a YAML mapping. `None` when there is no comment.
pub fn page_metadata(doc: &Document) -> Option<Result<Metadata, MetadataError>> {
    doc.first_comment().map(Metadata::from_yaml)
}
