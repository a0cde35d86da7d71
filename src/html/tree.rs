//! A small, lenient HTML tree built from `quick-xml` events.
//!
//! The tokenizer runs with every XML well-formedness check disabled and the
//! builder applies the few HTML rules the pipeline depends on:
//!
//! - void elements (`br`, `img`, `embed`, ...) never take children, whether
//!   or not they are written self-closed;
//! - `script`, `style` and `textarea` bodies are kept verbatim;
//! - a `<` that does not start a tag name (`1 < 2`) is text and is written
//!   back as `&lt;`;
//! - end tags with no matching open element are dropped, and an end tag closes
//!   every element opened after its match;
//! - a new `<li>` or `<p>` closes an open element of the same name, as HTML's
//!   implied end tags do;
//! - elements still open at end of input are closed there.
//!
//! Text, entity references and attribute values are stored exactly as they
//! appeared so that re-serializing an untouched tree reproduces its markup.
//! They are decoded only when read as text ([`Element::attr`],
//! [`Node::text_content`]).

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HtmlError {
    #[error("HTML parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },
    #[error("HTML is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

/// Elements that stop the search for an open `<li>` to close.
const LIST_SCOPE: &[&str] = &["ul", "ol", "menu"];

/// Elements that stop the search for an open `<p>` to close.
const BUTTON_SCOPE: &[&str] = &[
    "button", "table", "td", "th", "caption", "object", "template", "html",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Character data as written, entity references included.
    Text(String),
    /// Comment body, without the `<!--` `-->` delimiters.
    Comment(String),
    /// Doctype body, e.g. `html`.
    Doctype(String),
    /// Markup emitted verbatim: raw-text element bodies and CDATA sections.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Lowercased tag name.
    pub name: String,
    /// Attributes in source order; names lowercased, values still escaped.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// Written as `<name ... />` in the source.
    pub self_closing: bool,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            self_closing: false,
        }
    }

    /// Decoded value of an attribute. Valueless attributes yield `""`.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| decode(value).into_owned())
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }

    /// Whether any direct child is a text node with non-whitespace content.
    pub fn has_direct_text(&self) -> bool {
        self.children
            .iter()
            .any(|child| matches!(child, Node::Text(text) if !text.trim().is_empty()))
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn inner_html(&self) -> String {
        to_html(&self.children)
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            let _ = write!(out, " {key}=\"{}\"", value.replace('"', "&quot;"));
        }
        if self.children.is_empty() && (self.self_closing || self.is_void()) {
            out.push_str(" />");
            return;
        }
        out.push('>');
        write_nodes(&self.children, out);
        let _ = write!(out, "</{}>", self.name);
    }
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Decoded text of this node and its descendants. Comments are skipped.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(std::slice::from_ref(self), &mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_html(out),
            Node::Text(text) | Node::Raw(text) => out.push_str(text),
            Node::Comment(body) => {
                let _ = write!(out, "<!--{body}-->");
            }
            Node::Doctype(body) => {
                let _ = write!(out, "<!DOCTYPE {body}>");
            }
        }
    }
}

/// A parsed HTML document or fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    pub fn parse(html: &str) -> Result<Self, HtmlError> {
        Ok(Self {
            children: parse_nodes(html)?,
        })
    }

    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, HtmlError> {
        Self::parse(std::str::from_utf8(bytes)?)
    }

    pub fn to_html(&self) -> String {
        to_html(&self.children)
    }

    /// First `<body>` element, searched depth-first.
    pub fn body(&self) -> Option<&Element> {
        self.find_element(|element| element.name == "body")
    }

    /// Inner HTML of `<body>`, or the whole document when there is none.
    pub fn body_html(&self) -> String {
        match self.body() {
            Some(body) => body.inner_html(),
            None => self.to_html(),
        }
    }

    /// Consume the document into the nodes that should be spliced elsewhere:
    /// the children of `<body>` if present, otherwise every top-level node.
    pub fn into_fragment(self) -> Vec<Node> {
        if let Some(body) = self.body() {
            return body.children.clone();
        }
        self.children
    }

    /// First element in document order matching `predicate`.
    pub fn find_element(&self, predicate: impl Fn(&Element) -> bool) -> Option<&Element> {
        find_in(&self.children, &predicate)
    }

    /// Body of the first comment in document order.
    pub fn first_comment(&self) -> Option<&str> {
        first_comment_in(&self.children)
    }

    /// Index paths of every element matching `predicate`, in document order.
    ///
    /// Paths stay valid for [`Document::node_at`] and [`Document::replace`]
    /// as long as replacements are applied last-to-first.
    pub fn find_paths(&self, predicate: impl Fn(&Element) -> bool) -> Vec<Vec<usize>> {
        let mut paths = Vec::new();
        let mut prefix = Vec::new();
        collect_paths(&self.children, &predicate, &mut prefix, &mut paths);
        paths
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (last, parents) = path.split_last()?;
        let mut children = &self.children;
        for &index in parents {
            children = &children.get(index)?.as_element()?.children;
        }
        children.get(*last)
    }

    /// Replace the node at `path` with `replacement`, in place among its
    /// siblings. Returns false when the path does not address a node.
    pub fn replace(&mut self, path: &[usize], replacement: Vec<Node>) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };
        let mut children = &mut self.children;
        for &index in parents {
            children = match children.get_mut(index) {
                Some(Node::Element(element)) => &mut element.children,
                _ => return false,
            };
        }
        if *last >= children.len() {
            return false;
        }
        children.splice(*last..=*last, replacement);
        true
    }
}

/// Serialize a node list.
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_nodes(nodes, &mut out);
    out
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        node.write_html(out);
    }
}

/// Decode entity references; text with unknown entities is returned as is.
pub fn decode(raw: &str) -> Cow<'_, str> {
    unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&decode(text)),
            Node::Raw(text) => out.push_str(text),
            Node::Element(element) => collect_text(&element.children, out),
            Node::Comment(_) | Node::Doctype(_) => {}
        }
    }
}

fn find_in<'a>(nodes: &'a [Node], predicate: &impl Fn(&Element) -> bool) -> Option<&'a Element> {
    nodes.iter().find_map(|node| match node {
        Node::Element(element) if predicate(element) => Some(element),
        Node::Element(element) => find_in(&element.children, predicate),
        _ => None,
    })
}

fn first_comment_in(nodes: &[Node]) -> Option<&str> {
    nodes.iter().find_map(|node| match node {
        Node::Comment(body) => Some(body.as_str()),
        Node::Element(element) => first_comment_in(&element.children),
        _ => None,
    })
}

fn collect_paths(
    nodes: &[Node],
    predicate: &impl Fn(&Element) -> bool,
    prefix: &mut Vec<usize>,
    paths: &mut Vec<Vec<usize>>,
) {
    for (index, node) in nodes.iter().enumerate() {
        if let Node::Element(element) = node {
            prefix.push(index);
            if predicate(element) {
                paths.push(prefix.clone());
            }
            collect_paths(&element.children, predicate, prefix, paths);
            prefix.pop();
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

struct Builder {
    open: Vec<Element>,
    top: Vec<Node>,
}

impl Builder {
    fn append(&mut self, node: Node) {
        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.top,
        };
        if let (Node::Text(text), Some(Node::Text(previous))) = (&node, siblings.last_mut()) {
            previous.push_str(text);
            return;
        }
        siblings.push(node);
    }

    fn close_to(&mut self, depth: usize) {
        while self.open.len() > depth {
            if let Some(element) = self.open.pop() {
                self.append(Node::Element(element));
            }
        }
    }

    /// Close an open element ended implicitly by a new start tag `name`.
    fn close_implied(&mut self, name: &str) {
        let scope = match name {
            "li" => LIST_SCOPE,
            "p" => BUTTON_SCOPE,
            _ => return,
        };
        let found = self
            .open
            .iter()
            .rposition(|open| open.name == name || scope.contains(&open.name.as_str()));
        if let Some(depth) = found {
            if self.open[depth].name == name {
                self.close_to(depth);
            }
        }
    }

    fn close(&mut self, name: &str) {
        if let Some(depth) = self.open.iter().rposition(|element| element.name == name) {
            self.close_to(depth);
        }
    }

    fn finish(mut self) -> Vec<Node> {
        self.close_to(0);
        self.top
    }
}

fn parse_nodes(html: &str) -> Result<Vec<Node>, HtmlError> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.enable_all_checks(false);
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut builder = Builder {
        open: Vec::new(),
        top: Vec::new(),
    };

    loop {
        let event = reader.read_event().map_err(|err| HtmlError::Parse {
            position: reader.error_position() as u64,
            message: err.to_string(),
        })?;
        match event {
            Event::Start(start) if !is_tag_name(start.name().as_ref()) => {
                builder.append(stray_text(&start, ">"));
            }
            Event::Empty(start) if !is_tag_name(start.name().as_ref()) => {
                builder.append(stray_text(&start, "/>"));
            }
            Event::End(end) if end.name().as_ref().is_empty() => {}
            Event::Start(start) => {
                let mut element = start_element(&start, false);
                if RAW_TEXT_ELEMENTS.contains(&element.name.as_str()) {
                    let end = start.to_end().into_owned();
                    let body = reader.read_text(end.name()).map_err(|err| HtmlError::Parse {
                        position: reader.error_position() as u64,
                        message: err.to_string(),
                    })?;
                    if !body.is_empty() {
                        element.children.push(Node::Raw(body.into_owned()));
                    }
                    builder.append(Node::Element(element));
                } else if element.is_void() {
                    builder.append(Node::Element(element));
                } else {
                    builder.close_implied(&element.name);
                    builder.open.push(element);
                }
            }
            Event::Empty(start) => builder.append(Node::Element(start_element(&start, true))),
            Event::End(end) => {
                let name = lossy(end.name().as_ref()).to_ascii_lowercase();
                builder.close(&name);
            }
            Event::Text(text) => builder.append(Node::Text(lossy(&text).into_owned())),
            Event::GeneralRef(reference) => {
                builder.append(Node::Text(format!("&{};", lossy(&reference))));
            }
            Event::CData(data) => {
                builder.append(Node::Raw(format!("<![CDATA[{}]]>", lossy(&data))));
            }
            Event::Comment(comment) => builder.append(Node::Comment(lossy(&comment).into_owned())),
            Event::DocType(doctype) => {
                builder.append(Node::Doctype(lossy(&doctype).trim().to_string()));
            }
            Event::Decl(_) | Event::PI(_) => {}
            Event::Eof => break,
        }
    }

    Ok(builder.finish())
}

fn start_element(start: &BytesStart<'_>, self_closing: bool) -> Element {
    let attrs = start
        .html_attributes()
        .flatten()
        .map(|attr| {
            (
                lossy(attr.key.as_ref()).to_ascii_lowercase(),
                lossy(&attr.value).into_owned(),
            )
        })
        .collect();
    Element {
        name: lossy(start.name().as_ref()).to_ascii_lowercase(),
        attrs,
        children: Vec::new(),
        self_closing,
    }
}

fn is_tag_name(name: &[u8]) -> bool {
    name.first().is_some_and(u8::is_ascii_alphabetic)
}

/// Text for markup the tokenizer took for a tag but that has no tag name.
fn stray_text(start: &BytesStart<'_>, close: &str) -> Node {
    Node::Text(format!("&lt;{}{close}", lossy(start)))
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Document {
        Document::parse(html).unwrap()
    }

    fn element(node: &Node) -> &Element {
        node.as_element().expect("expected element")
    }

    #[test]
    fn parses_nested_elements() {
        let doc = parse("<div class=\"a\"><p>Hello <b>world</b></p></div>");
        let div = element(&doc.children[0]);
        assert_eq!(div.name, "div");
        assert_eq!(div.attr("class").as_deref(), Some("a"));
        let p = element(&div.children[0]);
        assert_eq!(p.text_content(), "Hello world");
    }

    #[test]
    fn untouched_markup_round_trips() {
        let html = "<h1>Title</h1>\n<p>Fish &amp; chips &lt;3</p>\n<!-- note -->";
        assert_eq!(parse(html).to_html(), html);
    }

    #[test]
    fn entities_decoded_only_as_text() {
        let doc = parse("<p title=\"a &amp; b\">x &amp; y</p>");
        let p = element(&doc.children[0]);
        assert_eq!(p.text_content(), "x & y");
        assert_eq!(p.attr("title").as_deref(), Some("a & b"));
        assert_eq!(doc.to_html(), "<p title=\"a &amp; b\">x &amp; y</p>");
    }

    #[test]
    fn unknown_entity_kept_verbatim() {
        let doc = parse("<p>a&nbsp;b</p>");
        assert_eq!(doc.to_html(), "<p>a&nbsp;b</p>");
        assert_eq!(element(&doc.children[0]).text_content(), "a&nbsp;b");
    }

    #[test]
    fn void_elements_take_no_children() {
        let doc = parse("<p>a<br>b<img src=\"x.png\">c</p>");
        let p = element(&doc.children[0]);
        assert_eq!(p.children.len(), 5);
        assert_eq!(doc.to_html(), "<p>a<br />b<img src=\"x.png\" />c</p>");
    }

    #[test]
    fn embed_without_slash_is_void() {
        let doc = parse("<div><embed src=\"a.md\" type=\"text/markdown\"><p>after</p></div>");
        let div = element(&doc.children[0]);
        assert_eq!(div.children.len(), 2);
        assert_eq!(element(&div.children[0]).name, "embed");
        assert_eq!(element(&div.children[1]).name, "p");
    }

    #[test]
    fn self_closing_element_serializes_self_closed() {
        let doc = parse("<embed src=\"a.md\" type=\"text/markdown\"/>");
        let embed = element(&doc.children[0]);
        assert!(embed.self_closing);
        assert_eq!(doc.to_html(), "<embed src=\"a.md\" type=\"text/markdown\" />");
    }

    #[test]
    fn raw_text_elements_kept_verbatim() {
        let html = "<script>document.write(\"<b>bold</b>\");</script><p>t</p>";
        let doc = parse(html);
        let script = element(&doc.children[0]);
        assert_eq!(
            script.children,
            vec![Node::Raw("document.write(\"<b>bold</b>\");".into())]
        );
        assert_eq!(element(&doc.children[1]).name, "p");
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn unmatched_end_tags_ignored() {
        let doc = parse("<p>a</span>b</p></div>");
        assert_eq!(doc.to_html(), "<p>ab</p>");
    }

    #[test]
    fn end_tag_closes_inner_open_elements() {
        let doc = parse("<div><p>a<b>bold</div>tail");
        assert_eq!(doc.to_html(), "<div><p>a<b>bold</b></p></div>tail");
    }

    #[test]
    fn open_elements_closed_at_end() {
        let doc = parse("<div><p>unterminated");
        assert_eq!(doc.to_html(), "<div><p>unterminated</p></div>");
    }

    #[test]
    fn tag_and_attribute_names_lowercased() {
        let doc = parse("<DIV ID=\"x\"><P>a</P></DIV>");
        assert_eq!(doc.to_html(), "<div id=\"x\"><p>a</p></div>");
    }

    #[test]
    fn doctype_preserved() {
        let doc = parse("<!DOCTYPE html><html><body><p>x</p></body></html>");
        assert_eq!(doc.children[0], Node::Doctype("html".into()));
        assert_eq!(doc.body_html(), "<p>x</p>");
    }

    #[test]
    fn body_html_falls_back_to_whole_fragment() {
        let doc = parse("<h1>T</h1><p>x</p>");
        assert_eq!(doc.body_html(), "<h1>T</h1><p>x</p>");
    }

    #[test]
    fn into_fragment_prefers_body_children() {
        let doc = parse("<html><head><title>t</title></head><body><p>x</p>tail</body></html>");
        let nodes = doc.into_fragment();
        assert_eq!(to_html(&nodes), "<p>x</p>tail");
    }

    #[test]
    fn first_comment_found_depth_first() {
        let doc = parse("<div><p>x<!-- inner --></p></div><!-- later -->");
        assert_eq!(doc.first_comment(), Some(" inner "));
    }

    #[test]
    fn find_paths_in_document_order() {
        let doc = parse("<div><embed src=\"1\"/><p><embed src=\"2\"/></p></div><embed src=\"3\"/>");
        let paths = doc.find_paths(|el| el.name == "embed");
        assert_eq!(paths, vec![vec![0, 0], vec![0, 1, 0], vec![1]]);
        let srcs: Vec<String> = paths
            .iter()
            .map(|path| element(doc.node_at(path).unwrap()).attr("src").unwrap())
            .collect();
        assert_eq!(srcs, vec!["1", "2", "3"]);
    }

    #[test]
    fn replace_splices_in_place() {
        let mut doc = parse("<div><i>a</i><embed src=\"x\"/><i>b</i></div>");
        let replacement = Document::parse("<p>one</p><p>two</p>").unwrap().children;
        assert!(doc.replace(&[0, 1], replacement));
        assert_eq!(doc.to_html(), "<div><i>a</i><p>one</p><p>two</p><i>b</i></div>");
    }

    #[test]
    fn replace_with_nothing_removes_node() {
        let mut doc = parse("<p>a</p><hr><p>b</p>");
        assert!(doc.replace(&[1], Vec::new()));
        assert_eq!(doc.to_html(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn replace_rejects_bad_path() {
        let mut doc = parse("<p>a</p>");
        assert!(!doc.replace(&[3], Vec::new()));
        assert!(!doc.replace(&[0, 0, 0], Vec::new()));
        assert!(!doc.replace(&[], Vec::new()));
    }

    #[test]
    fn valueless_attribute_reads_empty() {
        let doc = parse("<input disabled>");
        let input = element(&doc.children[0]);
        assert_eq!(input.attr("disabled").as_deref(), Some(""));
        assert_eq!(input.attr("missing"), None);
    }

    #[test]
    fn bare_less_than_in_text_is_kept_as_text() {
        let doc = parse("<p>1 < 2 and 3 > 2</p>");
        assert_eq!(doc.to_html(), "<p>1 &lt; 2 and 3 > 2</p>");
        let p = element(&doc.children[0]);
        assert_eq!(p.children.len(), 1);
        assert_eq!(p.text_content(), "1 < 2 and 3 > 2");
    }

    #[test]
    fn less_than_before_digit_is_text() {
        let doc = parse("<p>x <3 y> z</p>");
        assert_eq!(doc.to_html(), "<p>x &lt;3 y> z</p>");
    }

    #[test]
    fn nameless_end_tag_dropped() {
        assert_eq!(parse("<p>a</>b</p>").to_html(), "<p>ab</p>");
    }

    #[test]
    fn unclosed_list_items_are_siblings() {
        let doc = parse("<ul><li>a<li>b</ul>");
        assert_eq!(doc.to_html(), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn nested_list_keeps_outer_item_open() {
        let html = "<ul><li>a<ul><li>b</li></ul></li></ul>";
        assert_eq!(parse(html).to_html(), html);
        assert_eq!(
            parse("<ul><li>a<ul><li>b<li>c</ul></ul>").to_html(),
            "<ul><li>a<ul><li>b</li><li>c</li></ul></li></ul>"
        );
    }

    #[test]
    fn unclosed_paragraphs_are_siblings() {
        let doc = parse("<p>one<p>two");
        assert_eq!(doc.to_html(), "<p>one</p><p>two</p>");
        assert_eq!(doc.children.len(), 2);
    }

    #[test]
    fn invalid_utf8_rejected() {
        let err = Document::parse_bytes(&[b'<', b'p', b'>', 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, HtmlError::Encoding(_)));
    }

    #[test]
    fn has_direct_text_ignores_whitespace() {
        let doc = parse("<p> \n <img src=\"a\"> </p><p><b>x</b> y</p>");
        assert!(!element(&doc.children[0]).has_direct_text());
        assert!(element(&doc.children[1]).has_direct_text());
    }
}
