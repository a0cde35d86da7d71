//! Filename conventions shared by the walker, the context builder, and the
//! plugin invoker.
//!
//! - Entries whose name starts with `.` are hidden: skipped by the walker,
//!   including whole subtrees. Configuration lives under hidden names for
//!   exactly this reason.
//! - `*.md` is Markdown, `*.html` is HTML; anything else is copied verbatim.
//! - MIME-type plugins are executables named `plume-mime-<name>`.

use std::path::{Component, Path};

/// Leading character that hides an entry from the walker.
pub const HIDDEN_MARKER: char = '.';

/// Prefix shared by every external plume executable.
pub const PLUGIN_PREFIX: &str = "plume-";

/// Class marker for MIME-type embed plugins.
pub const MIME_PLUGIN_MARKER: &str = "mime-";

/// How the walker routes an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Markdown,
    Html,
    Other,
}

impl EntryKind {
    /// Markdown and HTML sources go through the render pipeline.
    pub fn is_page(self) -> bool {
        matches!(self, EntryKind::Markdown | EntryKind::Html)
    }
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with(HIDDEN_MARKER)
}

/// Classify an entry by type and extension. Extensions are case-sensitive.
pub fn classify(path: &Path, is_dir: bool) -> EntryKind {
    if is_dir {
        return EntryKind::Directory;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("md") => EntryKind::Markdown,
        Some("html") => EntryKind::Html,
        _ => EntryKind::Other,
    }
}

/// Executable name for a MIME-type plugin: `plume-mime-<name>`.
pub fn plugin_command(plugin: &str) -> String {
    format!("{PLUGIN_PREFIX}{MIME_PLUGIN_MARKER}{plugin}")
}

/// Site-relative URL for a source path: `/` + the path with `/` separators.
///
/// The extension is kept because the deployment tree mirrors the source
/// tree file-for-file.
pub fn url_path(rel: &Path) -> String {
    format!("/{}", slash_path(rel))
}

/// Relative path joined with `/` regardless of platform. `.` and root
/// components are dropped.
pub fn slash_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Absolute link: `baseurl` without its trailing `/`, followed by the URL.
pub fn permalink(baseurl: &str, url: &str) -> String {
    format!("{}{}", baseurl.trim_end_matches('/'), url)
}
