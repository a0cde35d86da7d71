//! # Plume
//!
//! A static site build pipeline. The project directory is the site: every
//! Markdown and HTML file is a template rendered into a shared layout, every
//! other file is copied as-is, and `<embed>` markers are replaced with HTML
//! produced by MIME-type plugins.
//!
//! # Architecture: One Walk, One Pipeline per Page
//!
//! ```text
//! project/  ──walk──►  directory?  ──►  mkdir in deploy/
//!                      *.md|*.html ──►  template → markdown → post-process
//!                                       → embeds → layout → deploy/
//!                      other       ──►  copy to deploy/
//! ```
//!
//! A page's pipeline reads three metadata layers, most specific first:
//!
//! ```text
//! page       first HTML comment of the page, parsed as YAML
//! directory  nearest .plume.yml walking up from the page's directory
//! site       [site] section of .plume/config.toml
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`generate`] | Walks the project, routes entries, runs the page pipeline, writes the deployment tree |
//! | [`config`] | `.plume/config.toml` loading, stock defaults, merging, validation |
//! | [`cache`] | Per-build cache of resolved directory metadata |
//! | [`context`] | The per-page namespace templates render against |
//! | [`template`] | Jinja environment: source expansion and the shared layout |
//! | [`markdown`] | Markdown to HTML |
//! | [`html`] | Lenient HTML tree, paragraph cleanup, title and page metadata detection |
//! | [`embed`] | Finds `<embed>` markers and splices in their replacement |
//! | [`plugin`] | Runs plugin executables behind the [`plugin::PluginRunner`] seam |
//! | [`naming`] | File classification, URLs, plugin executable names |
//! | [`types`] | Metadata mappings shared by all three layers |
//! | [`output`] | CLI output formatting for build and check reports |
//!
//! # Design Decisions
//!
//! ## Sources Are Templates First
//!
//! Template expansion runs on the raw source, before Markdown conversion. A
//! template can therefore emit Markdown, and Markdown can never produce
//! template syntax by accident.
//!
//! ## Plugins Are Plain Executables
//!
//! A plugin is any program named `plume-mime-<name>`, found in the project's
//! plugin directories or on `PATH`. It receives the embed's `src` as its only
//! argument, runs in the project root, and writes an HTML fragment to stdout.
//! Any language works; nothing is linked into the binary.
//!
//! ## One Bad Page Does Not Stop the Site
//!
//! Failures inside a page's pipeline are reported and that page is skipped;
//! the rest of the site still builds. Only problems that affect every page
//! (config, layout, directory metadata, the deployment tree itself) abort.

pub mod cache;
pub mod config;
pub mod context;
pub mod embed;
pub mod generate;
pub mod html;
pub mod markdown;
pub mod naming;
pub mod output;
pub mod plugin;
pub mod template;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
