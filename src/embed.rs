//! `<embed>` resolution.
//!
//! An embed marker is `<embed src="path" type="mime/type">`. The MIME type is
//! looked up in the `[mimetypes]` config section to get a plugin name. A
//! plugin name with a built-in handler runs in-process; any other name is an
//! external plugin run through a [`PluginRunner`].
//!
//! ```text
//! <embed src="docs/intro.md" type="text/markdown">
//!   → [mimetypes] "text/markdown" = "markdown"
//!   → built-in markdown handler → <h1>…</h1><p>…</p>
//!
//! <embed src="graphs/flow.dot" type="text/vnd.graphviz">
//!   → [mimetypes] "text/vnd.graphviz" = "graphviz"
//!   → plume-mime-graphviz graphs/flow.dot → <svg>…</svg>
//! ```
//!
//! Markers are collected first, resolved one at a time in document order,
//! then spliced in last-to-first so earlier paths stay valid. Content coming
//! out of a handler is spliced as-is and never scanned for further markers.
//! The first failure aborts the page; later markers are not run.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::html::{Document, Element, HtmlError, Node};
use crate::markdown;
use crate::plugin::{self, PluginError, PluginRunner};

/// Name of the built-in Markdown handler, as used in `[mimetypes]`.
pub const MARKDOWN_HANDLER: &str = "markdown";

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("<embed> is missing its '{0}' attribute")]
    MissingAttribute(&'static str),
    #[error("no plugin registered for MIME type '{0}'")]
    UnregisteredType(String),
    #[error("cannot read embedded file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Html(#[from] HtmlError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// In-process handler: given the project root and the marker's `src`,
/// produce the nodes that replace the marker.
pub type Handler = fn(&Path, &str) -> Result<Vec<Node>, EmbedError>;

/// A marker's two attributes, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedRequest {
    pub src: String,
    pub mime: String,
}

impl EmbedRequest {
    pub fn from_marker(marker: &Element) -> Result<Self, EmbedError> {
        let src = marker.attr("src").ok_or(EmbedError::MissingAttribute("src"))?;
        let mime = marker.attr("type").ok_or(EmbedError::MissingAttribute("type"))?;
        Ok(Self { src, mime })
    }
}

pub struct EmbedResolver<R> {
    root: PathBuf,
    config: Arc<Config>,
    runner: R,
    builtins: HashMap<&'static str, Handler>,
}

impl<R: PluginRunner> EmbedResolver<R> {
    pub fn new(root: impl Into<PathBuf>, config: Arc<Config>, runner: R) -> Self {
        let mut builtins: HashMap<&'static str, Handler> = HashMap::new();
        builtins.insert(MARKDOWN_HANDLER, embed_markdown);
        Self {
            root: root.into(),
            config,
            runner,
            builtins,
        }
    }

    /// Register or replace an in-process handler.
    pub fn register(&mut self, name: &'static str, handler: Handler) {
        self.builtins.insert(name, handler);
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Replace every `<embed>` in `doc`. Returns the number resolved.
    pub fn resolve(&self, doc: &mut Document) -> Result<usize, EmbedError> {
        let markers = doc.find_paths(|element| element.name == "embed");
        let mut replacements = Vec::with_capacity(markers.len());
        for path in markers {
            let Some(marker) = doc.node_at(&path).and_then(Node::as_element) else {
                continue;
            };
            let request = EmbedRequest::from_marker(marker)?;
            let nodes = self.dispatch(&request)?;
            replacements.push((path, nodes));
        }

        let resolved = replacements.len();
        for (path, nodes) in replacements.into_iter().rev() {
            doc.replace(&path, nodes);
        }
        Ok(resolved)
    }

    fn dispatch(&self, request: &EmbedRequest) -> Result<Vec<Node>, EmbedError> {
        let plugin = self
            .config
            .plugin_for(&request.mime)
            .ok_or_else(|| EmbedError::UnregisteredType(request.mime.clone()))?;
        tracing::debug!(src = %request.src, mime = %request.mime, plugin, "resolving embed");
        match self.builtins.get(plugin) {
            Some(handler) => handler(&self.root, &request.src),
            None => Ok(plugin::invoke(&self.runner, plugin, &request.src)?),
        }
    }
}

/// Built-in Markdown handler: render the file and splice its body.
fn embed_markdown(root: &Path, src: &str) -> Result<Vec<Node>, EmbedError> {
    let path = root.join(src);
    let source = fs::read_to_string(&path).map_err(|source| EmbedError::Read { path, source })?;
    let html = markdown::to_html(&source);
    Ok(Document::parse(&html)?.into_fragment())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::tests::{MockRunner, RecordedCall};
    use tempfile::TempDir;

    fn resolver(tmp: &TempDir, config: &str, runner: MockRunner) -> EmbedResolver<MockRunner> {
        let config = Config::from_toml_str(config).unwrap();
        EmbedResolver::new(tmp.path(), Arc::new(config), runner)
    }

    fn resolve(resolver: &EmbedResolver<MockRunner>, html: &str) -> Result<String, EmbedError> {
        let mut doc = Document::parse(html)?;
        resolver.resolve(&mut doc)?;
        Ok(doc.to_html())
    }

    #[test]
    fn markdown_embed_replaced_in_place() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "# Hi\nBody text").unwrap();
        let resolver = resolver(&tmp, "", MockRunner::new());

        let html = resolve(
            &resolver,
            "<div><i>before</i><embed src=\"a.md\" type=\"text/markdown\"><i>after</i></div>",
        )
        .unwrap();
        assert_eq!(
            html,
            "<div><i>before</i><h1>Hi</h1>\n<p>Body text</p>\n<i>after</i></div>"
        );
        assert!(!html.contains("<embed"));
        assert!(resolver.runner().get_calls().is_empty());
    }

    #[test]
    fn unregistered_name_goes_to_plugin() {
        let tmp = TempDir::new().unwrap();
        let runner = MockRunner::new().with_output("graphviz", "<svg></svg>");
        let resolver = resolver(&tmp, "[mimetypes]\n\"text/vnd.graphviz\" = \"graphviz\"", runner);

        let html = resolve(&resolver, "<p>x</p><embed src=\"g/a.dot\" type=\"text/vnd.graphviz\"/>").unwrap();
        assert_eq!(html, "<p>x</p><svg></svg>");
        assert_eq!(
            resolver.runner().get_calls(),
            vec![RecordedCall {
                plugin: "graphviz".into(),
                src: "g/a.dot".into()
            }]
        );
    }

    #[test]
    fn rebinding_markdown_type_bypasses_builtin() {
        let tmp = TempDir::new().unwrap();
        let runner = MockRunner::new().with_output("pandoc", "<article>from pandoc</article>");
        let resolver = resolver(&tmp, "[mimetypes]\n\"text/markdown\" = \"pandoc\"", runner);

        let html = resolve(&resolver, "<embed src=\"a.md\" type=\"text/markdown\">").unwrap();
        assert_eq!(html, "<article>from pandoc</article>");
        assert_eq!(resolver.runner().get_calls().len(), 1);
    }

    #[test]
    fn registered_handler_overrides_plugin() {
        fn shout(_root: &Path, src: &str) -> Result<Vec<Node>, EmbedError> {
            Ok(vec![Node::Text(src.to_uppercase())])
        }
        let tmp = TempDir::new().unwrap();
        let mut resolver = resolver(&tmp, "[mimetypes]\n\"text/x-shout\" = \"shout\"", MockRunner::new());
        resolver.register("shout", shout);

        let html = resolve(&resolver, "<p>say <embed src=\"hello\" type=\"text/x-shout\"></p>").unwrap();
        assert_eq!(html, "<p>say HELLO</p>");
        assert!(resolver.runner().get_calls().is_empty());
    }

    #[test]
    fn markers_resolved_in_document_order() {
        let tmp = TempDir::new().unwrap();
        let runner = MockRunner::new().with_output("echo", "<b>e</b>");
        let resolver = resolver(&tmp, "[mimetypes]\n\"text/x-echo\" = \"echo\"", runner);

        resolve(
            &resolver,
            "<div><embed src=\"1\" type=\"text/x-echo\"><p><embed src=\"2\" type=\"text/x-echo\"></p></div>\
             <embed src=\"3\" type=\"text/x-echo\">",
        )
        .unwrap();
        let srcs: Vec<String> = resolver.runner().get_calls().into_iter().map(|c| c.src).collect();
        assert_eq!(srcs, vec!["1", "2", "3"]);
    }

    #[test]
    fn embedded_content_not_rescanned() {
        let tmp = TempDir::new().unwrap();
        let runner = MockRunner::new().with_output("loop", "<embed src=\"again\" type=\"text/x-loop\">");
        let resolver = resolver(&tmp, "[mimetypes]\n\"text/x-loop\" = \"loop\"", runner);

        let mut doc = Document::parse("<embed src=\"start\" type=\"text/x-loop\">").unwrap();
        assert_eq!(resolver.resolve(&mut doc).unwrap(), 1);
        assert_eq!(doc.to_html(), "<embed src=\"again\" type=\"text/x-loop\" />");
        assert_eq!(resolver.runner().get_calls().len(), 1);
    }

    #[test]
    fn failure_stops_later_markers() {
        let tmp = TempDir::new().unwrap();
        let runner = MockRunner::new().with_exit("bad", 1).with_output("good", "<p>ok</p>");
        let resolver = resolver(
            &tmp,
            "[mimetypes]\n\"text/x-bad\" = \"bad\"\n\"text/x-good\" = \"good\"",
            runner,
        );

        let err = resolve(
            &resolver,
            "<embed src=\"a\" type=\"text/x-bad\"><embed src=\"b\" type=\"text/x-good\">",
        )
        .unwrap_err();
        assert!(matches!(err, EmbedError::Plugin(PluginError::Failed { .. })));
        let calls = resolver.runner().get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].plugin, "bad");
    }

    #[test]
    fn unknown_mime_type_is_error() {
        let tmp = TempDir::new().unwrap();
        let resolver = resolver(&tmp, "", MockRunner::new());
        let err = resolve(&resolver, "<embed src=\"movie.swf\" type=\"application/x-shockwave-flash\">").unwrap_err();
        assert!(matches!(err, EmbedError::UnregisteredType(ref t) if t == "application/x-shockwave-flash"));
    }

    #[test]
    fn missing_attributes_are_errors() {
        let tmp = TempDir::new().unwrap();
        let resolver = resolver(&tmp, "", MockRunner::new());
        let err = resolve(&resolver, "<embed type=\"text/markdown\">").unwrap_err();
        assert!(matches!(err, EmbedError::MissingAttribute("src")));
        let err = resolve(&resolver, "<embed src=\"a.md\">").unwrap_err();
        assert!(matches!(err, EmbedError::MissingAttribute("type")));
    }

    #[test]
    fn missing_markdown_source_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let resolver = resolver(&tmp, "", MockRunner::new());
        let err = resolve(&resolver, "<embed src=\"nope.md\" type=\"text/markdown\">").unwrap_err();
        assert!(matches!(err, EmbedError::Read { .. }));
        assert!(err.to_string().contains("nope.md"));
    }

    #[test]
    fn no_markers_is_noop() {
        let tmp = TempDir::new().unwrap();
        let resolver = resolver(&tmp, "", MockRunner::new());
        let mut doc = Document::parse("<p>plain</p>").unwrap();
        assert_eq!(resolver.resolve(&mut doc).unwrap(), 0);
        assert_eq!(doc.to_html(), "<p>plain</p>");
    }

    #[test]
    fn src_attribute_entities_decoded() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a&b.md"), "text").unwrap();
        let resolver = resolver(&tmp, "", MockRunner::new());
        let html = resolve(&resolver, "<embed src=\"a&amp;b.md\" type=\"text/markdown\">").unwrap();
        assert_eq!(html, "<p>text</p>\n");
    }
}
