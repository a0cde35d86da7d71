//! Shared test utilities for the plume test suite.
//!
//! Builds throwaway projects in temp directories and reads back what a build
//! deployed.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = project(&[("index.md", "# Hello")]);
//! let report = generate::build(tmp.path()).unwrap();
//!
//! assert!(read_deployed(tmp.path(), "index.md").contains("<h1>Hello</h1>"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

/// Layout written into every [`project`] unless the file list overrides it.
pub const TEST_LAYOUT: &str =
    "<html><head><title>{{ title }}</title></head><body>{{ body }}</body></html>";

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Temp project with [`TEST_LAYOUT`] and the given files. Paths are relative
/// to the project root; parent directories are created.
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), ".plume/layout.html", TEST_LAYOUT);
    for (path, content) in files {
        write_file(tmp.path(), path, content);
    }
    tmp
}

pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

// =========================================================================
// Deployed output
// =========================================================================

/// Path of `rel` inside the stock deployment directory.
pub fn deployed(root: &Path, rel: &str) -> PathBuf {
    root.join(".plume/deploy").join(rel)
}

/// Read a deployed file. Panics with the path on miss.
pub fn read_deployed(root: &Path, rel: &str) -> String {
    let path = deployed(root, rel);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read deployed {}: {e}", path.display()))
}

// =========================================================================
// Plugin scripts
// =========================================================================

static PROCESS_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that write executables and spawn children. A script
/// still open for writing in one thread while another forks makes `exec`
/// fail with "text file busy".
pub fn process_lock() -> MutexGuard<'static, ()> {
    PROCESS_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Write an executable `sh` plugin into the project's stock plugin directory.
#[cfg(unix)]
pub fn write_plugin(root: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let dir = root.join(".plume/plugins");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(crate::naming::plugin_command(name));
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
