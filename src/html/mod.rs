//! HTML handling: a lenient tree over the `quick-xml` tokenizer and the
//! post-processing passes run on every rendered page.

pub mod postprocess;
mod tree;

pub use tree::{Document, Element, HtmlError, Node, decode, to_html};
