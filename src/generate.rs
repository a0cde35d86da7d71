//! Site build.
//!
//! Walks the project root and mirrors it into the deployment directory:
//!
//! ```text
//! site/                          .plume/deploy/
//! ├── .plume/        (skipped)   ├── index.md       ← rendered
//! ├── .plume.yml     (skipped)   ├── docs/
//! ├── index.md       ──────────► │   └── guide.html ← rendered
//! ├── docs/                      └── static/
//! │   └── guide.html ──────────►     └── logo.png   ← copied
//! └── static/
//!     └── logo.png   ──────────►
//! ```
//!
//! Entries starting with `.` are skipped with their subtrees, as is the
//! deployment directory itself. Directories are recreated, `*.md` and
//! `*.html` go through the render pipeline, and everything else is copied
//! byte-for-byte. Output keeps the source file name and extension.
//!
//! ## Render pipeline (one page)
//!
//! 1. Expand the source as a template (no body, empty page layer).
//! 2. Markdown sources: convert the expanded text to HTML.
//! 3. Parse, clean up paragraphs, detect the title, read the page metadata
//!    comment.
//! 4. Resolve `<embed>` markers.
//! 5. Render the layout with the page body and full context.
//!
//! ## Failure policy
//!
//! Walk errors, I/O errors on the deployment tree, a broken layout, and
//! malformed directory metadata stop the build ([`GenerateError`]). Anything
//! that goes wrong inside one page's pipeline ([`RenderError`]) is logged,
//! recorded in the [`BuildReport`], and skips that page's output; the walk
//! goes on. A malformed page metadata comment is only a warning.
//!
//! The walk is sequential: each page is fully rendered, embeds included,
//! before the next entry is visited.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::cache::{CacheStats, DirectoryCache, DirectoryConfigError};
use crate::config::{Config, ConfigError};
use crate::context::PageContext;
use crate::embed::{EmbedError, EmbedResolver};
use crate::html::{Document, HtmlError, postprocess};
use crate::markdown;
use crate::naming::{self, EntryKind};
use crate::plugin::{PluginRunner, ProcessRunner};
use crate::template::{TemplateError, TemplateRenderer};
use crate::types::{Metadata, MetadataError};

/// Build-fatal errors.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Layout error: {0}")]
    Layout(#[from] TemplateError),
    #[error(transparent)]
    Directory(#[from] DirectoryConfigError),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("refusing to clear {}: it contains the project root", .0.display())]
    UnsafeDeploy(PathBuf),
}

/// Errors that fail a single page.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("source is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("template error: {0}")]
    Template(#[source] minijinja::Error),
    #[error("layout error: {0}")]
    Layout(#[source] minijinja::Error),
    #[error(transparent)]
    Html(#[from] HtmlError),
    #[error("embed error: {0}")]
    Embed(#[from] EmbedError),
}

/// A problem tied to one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileIssue {
    pub path: PathBuf,
    pub message: String,
}

impl FileIssue {
    pub fn new(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// What a build did, in walk order.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub directories: usize,
    pub rendered: Vec<PathBuf>,
    pub copied: Vec<PathBuf>,
    pub warnings: Vec<FileIssue>,
    pub failed: Vec<FileIssue>,
    pub cache: CacheStats,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What a check walk found.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub directories: usize,
    pub pages: usize,
    pub files: usize,
}

/// One rendered page, ready to write.
#[derive(Debug)]
pub struct RenderedPage {
    pub html: String,
    pub embeds: usize,
    pub page_error: Option<MetadataError>,
}

/// Build session: owns the shared config, the compiled layout, the
/// directory metadata cache and the embed resolver for one build.
pub struct Generator<R: PluginRunner = ProcessRunner> {
    root: PathBuf,
    deploy: PathBuf,
    config: Arc<Config>,
    templates: TemplateRenderer,
    directories: DirectoryCache,
    embeds: EmbedResolver<R>,
}

impl Generator<ProcessRunner> {
    pub fn new(root: &Path, config: Config) -> Result<Self, GenerateError> {
        let runner = ProcessRunner::from_config(root, &config);
        Self::with_runner(root, config, runner)
    }
}

impl<R: PluginRunner> Generator<R> {
    /// Compile the layout and set up the session. A missing or broken layout
    /// fails here, before anything is deleted or written.
    pub fn with_runner(root: &Path, config: Config, runner: R) -> Result<Self, GenerateError> {
        let config = Arc::new(config);
        let templates = TemplateRenderer::load(&config.layout_path(root))?;
        let directories =
            DirectoryCache::new(root, config.settings().build.metadata_file.clone());
        let embeds = EmbedResolver::new(root, Arc::clone(&config), runner);
        Ok(Self {
            root: root.to_path_buf(),
            deploy: config.deploy_dir(root),
            config,
            templates,
            directories,
            embeds,
        })
    }

    pub fn deploy_dir(&self) -> &Path {
        &self.deploy
    }

    pub fn embeds(&self) -> &EmbedResolver<R> {
        &self.embeds
    }

    /// Clear the deployment directory and mirror the source tree into it.
    pub fn run(&mut self) -> Result<BuildReport, GenerateError> {
        info!(source = %self.root.display(), deploy = %self.deploy.display(), "building site");
        self.prepare_deploy()?;
        let (root, deploy) = self.walk_roots()?;

        let mut report = BuildReport::default();
        for entry in walk_source(root.clone(), deploy) {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }
            let rel = relative(&root, &entry);
            let kind = naming::classify(&rel, entry.file_type().is_dir());
            debug!(path = %rel.display(), ?kind, "routing entry");

            match kind {
                EntryKind::Directory => {
                    let target = self.deploy.join(&rel);
                    fs::create_dir_all(&target).map_err(io_at(&target))?;
                    report.directories += 1;
                }
                EntryKind::Markdown | EntryKind::Html => {
                    self.build_page(&rel, kind, &mut report)?;
                }
                EntryKind::Other => {
                    let target = self.deploy.join(&rel);
                    fs::copy(entry.path(), &target).map_err(io_at(&target))?;
                    report.copied.push(rel);
                }
            }
        }

        report.cache = self.directories.stats().clone();
        info!(
            rendered = report.rendered.len(),
            copied = report.copied.len(),
            failed = report.failed.len(),
            "build finished"
        );
        Ok(report)
    }

    /// Walk the tree and resolve every page's directory metadata without
    /// writing anything.
    pub fn check(&mut self) -> Result<CheckReport, GenerateError> {
        let (root, deploy) = self.walk_roots()?;
        let mut report = CheckReport::default();
        for entry in walk_source(root.clone(), deploy) {
            let entry = entry?;
            if entry.depth() == 0 {
                continue;
            }
            let rel = relative(&root, &entry);
            let kind = naming::classify(&rel, entry.file_type().is_dir());
            if kind == EntryKind::Directory {
                report.directories += 1;
            } else if kind.is_page() {
                self.directories.resolve(&rel)?;
                report.pages += 1;
            } else {
                report.files += 1;
            }
        }
        Ok(report)
    }

    /// Render one page source. Pure with respect to the deployment tree.
    pub fn render(
        &self,
        rel: &Path,
        kind: EntryKind,
        source: Vec<u8>,
        directory: Option<Arc<Metadata>>,
    ) -> Result<RenderedPage, RenderError> {
        let source = String::from_utf8(source)?;
        let context = || PageContext::new(rel, Arc::clone(&self.config), directory.clone());

        let expanded = self
            .templates
            .render_source(&naming::slash_path(rel), &source, context())
            .map_err(RenderError::Template)?;
        let html = match kind {
            EntryKind::Markdown => markdown::to_html(&expanded),
            _ => expanded,
        };

        let mut doc = Document::parse(&html)?;
        let info = postprocess::process(&mut doc);
        let embeds = self.embeds.resolve(&mut doc)?;

        let page = context()
            .with_page(info.page)
            .with_body(doc.body_html(), info.first_title);
        let html = self
            .templates
            .render_layout(page)
            .map_err(RenderError::Layout)?;
        Ok(RenderedPage {
            html,
            embeds,
            page_error: info.page_error,
        })
    }

    fn build_page(
        &mut self,
        rel: &Path,
        kind: EntryKind,
        report: &mut BuildReport,
    ) -> Result<(), GenerateError> {
        let source_path = self.root.join(rel);
        let source = fs::read(&source_path).map_err(io_at(&source_path))?;
        let directory = self.directories.resolve(rel)?;

        match self.render(rel, kind, source, directory) {
            Ok(page) => {
                if let Some(err) = page.page_error {
                    warn!(path = %rel.display(), error = %err, "ignoring malformed page metadata");
                    report
                        .warnings
                        .push(FileIssue::new(rel, format!("page metadata ignored: {err}")));
                }
                let target = self.deploy.join(rel);
                fs::write(&target, page.html).map_err(io_at(&target))?;
                debug!(path = %rel.display(), embeds = page.embeds, "rendered");
                report.rendered.push(rel.to_path_buf());
            }
            Err(err) => {
                error!(path = %rel.display(), error = %err, "render failed, no output written");
                report.failed.push(FileIssue::new(rel, err.to_string()));
            }
        }
        Ok(())
    }

    /// Canonical project root and deployment directory for the walk, so the
    /// deployment directory is recognized however either path was spelled.
    /// A deployment directory that does not exist yet is taken as given.
    fn walk_roots(&self) -> Result<(PathBuf, PathBuf), GenerateError> {
        let root = fs::canonicalize(&self.root).map_err(io_at(&self.root))?;
        let deploy = fs::canonicalize(&self.deploy).unwrap_or_else(|_| self.deploy.clone());
        Ok((root, deploy))
    }

    fn prepare_deploy(&self) -> Result<(), GenerateError> {
        if self.deploy.exists() {
            let deploy = fs::canonicalize(&self.deploy).map_err(io_at(&self.deploy))?;
            let root = fs::canonicalize(&self.root).map_err(io_at(&self.root))?;
            if root.starts_with(&deploy) {
                return Err(GenerateError::UnsafeDeploy(self.deploy.clone()));
            }
            debug!(deploy = %self.deploy.display(), "removing previous deployment");
            fs::remove_dir_all(&self.deploy).map_err(io_at(&self.deploy))?;
        }
        fs::create_dir_all(&self.deploy).map_err(io_at(&self.deploy))
    }
}

/// Load the project's config and run a full build.
pub fn build(root: &Path) -> Result<BuildReport, GenerateError> {
    let config = Config::load(root)?;
    Generator::new(root, config)?.run()
}

/// Load the project's config, compile the layout, and walk without writing.
pub fn check(root: &Path) -> Result<CheckReport, GenerateError> {
    let config = Config::load(root)?;
    Generator::new(root, config)?.check()
}

/// Sorted walk that prunes hidden entries and the deployment directory.
fn walk_source(
    root: PathBuf,
    deploy: PathBuf,
) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            entry.depth() == 0
                || (!naming::is_hidden(&entry.file_name().to_string_lossy())
                    && entry.path() != deploy.as_path())
        })
}

fn relative(root: &Path, entry: &DirEntry) -> PathBuf {
    entry
        .path()
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| entry.path().to_path_buf())
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> GenerateError {
    let path = path.to_path_buf();
    move |source| GenerateError::Io { path, source }
}
