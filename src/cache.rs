//! Directory metadata cache.
//!
//! Every rendered file can see the metadata of its directory, read from a
//! per-directory file (`.plume.yml` by default). A directory without one
//! inherits from the nearest ancestor that has one, up to the project root.
//!
//! # Design
//!
//! Resolution is lazy and memoized per directory. The first query for
//! `docs/api/v2` probes `docs/api/v2`, then `docs/api`, then `docs`, and so on
//! until a metadata file is found or the root has been probed. The result is
//! cached under every directory visited on the way, so a later query for any
//! of them is a map lookup:
//!
//! ```text
//! resolve("docs/api/v2/page.md")
//!   probe docs/api/v2   (absent)  ─┐
//!   probe docs/api      (absent)   ├─ all cached → Arc(docs/.plume.yml)
//!   probe docs          (found)   ─┘
//! ```
//!
//! "Not found" is cached the same way, so a tree without metadata files costs
//! one probe per directory per build.
//!
//! A metadata file that exists but does not parse is a build error: these
//! files are hand-written configuration and should fail loudly.
//!
//! The cache is owned by the build session and only mutated by the
//! single-threaded walk, so it needs no locking.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::types::{Metadata, MetadataError};

#[derive(Error, Debug)]
pub enum DirectoryConfigError {
    #[error("cannot read directory metadata {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed directory metadata {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },
}

/// Resolved metadata for a directory; `None` when no ancestor has a file.
pub type Resolved = Option<Arc<Metadata>>;

/// Path-keyed cache of resolved directory metadata.
///
/// Keys are directories relative to the project root; the root itself is the
/// empty path.
#[derive(Debug)]
pub struct DirectoryCache {
    root: PathBuf,
    file_name: String,
    entries: HashMap<PathBuf, Resolved>,
    stats: CacheStats,
}

impl DirectoryCache {
    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Resolve the metadata governing a file, given its path relative to the
    /// project root. Absolute paths under the root are accepted too.
    pub fn resolve(&mut self, file: &Path) -> Result<Resolved, DirectoryConfigError> {
        let file = file.strip_prefix(&self.root).unwrap_or(file);
        let dir = file.parent().unwrap_or(Path::new(""));
        self.resolve_dir(dir)
    }

    /// Resolve the metadata for a directory relative to the project root.
    pub fn resolve_dir(&mut self, dir: &Path) -> Result<Resolved, DirectoryConfigError> {
        if let Some(cached) = self.entries.get(dir) {
            self.stats.hit();
            return Ok(cached.clone());
        }

        let resolved = match self.load(dir)? {
            Some(metadata) => Some(Arc::new(metadata)),
            None => match dir.parent() {
                Some(parent) => self.resolve_dir(parent)?,
                None => None,
            },
        };
        self.entries.insert(dir.to_path_buf(), resolved.clone());
        Ok(resolved)
    }

    /// Whether a directory already has a cached resolution.
    pub fn is_cached(&self, dir: &Path) -> bool {
        self.entries.contains_key(dir)
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn load(&mut self, dir: &Path) -> Result<Option<Metadata>, DirectoryConfigError> {
        self.stats.probe();
        let path = self.root.join(dir).join(&self.file_name);
        if !path.is_file() {
            tracing::debug!(dir = %dir.display(), "no directory metadata");
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| DirectoryConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let metadata = Metadata::from_yaml(&content)
            .map_err(|source| DirectoryConfigError::Malformed { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), keys = metadata.len(), "loaded directory metadata");
        Ok(Some(metadata))
    }
}

/// Cache counters for one build.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u32,
    /// Directories checked on disk for a metadata file.
    pub probes: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn probe(&mut self) {
        self.probes += 1;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} probed, {} cached", self.probes, self.hits)
    }
}
