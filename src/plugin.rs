//! External MIME-type plugins.
//!
//! A plugin is an executable named `plume-mime-<name>` (see
//! [`naming::plugin_command`]). It is looked up in each configured plugin
//! directory, then on `PATH`, and run with the embedded file's path as its
//! only argument and the project root as working directory.
//!
//! ## Protocol
//!
//! - stdout is captured and parsed as an HTML fragment;
//! - stderr is inherited, so plugin diagnostics reach the terminal as-is;
//! - stdin is closed;
//! - a non-zero exit status fails the page being rendered.
//!
//! stdout is drained on a separate thread while the calling thread waits
//! for the process to exit. A plugin that writes more than the OS pipe
//! buffer holds would otherwise block on write while we block on wait. The
//! reader hands its result back over a channel exactly once.
//!
//! There is no timeout: a plugin that never exits stalls the build.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use thiserror::Error;

use crate::config::Config;
use crate::html::{Document, HtmlError, Node};
use crate::naming;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("failed to start plugin '{plugin}' ({}): {source}", program.display())]
    Spawn {
        plugin: String,
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("plugin '{plugin}' I/O error: {source}")]
    Io {
        plugin: String,
        #[source]
        source: io::Error,
    },
    #[error("plugin '{plugin}' failed on {src} with {}", exit_label(.code))]
    Failed {
        plugin: String,
        src: String,
        code: Option<i32>,
    },
    #[error("plugin '{plugin}' produced unusable HTML for {src}: {source}")]
    Output {
        plugin: String,
        src: String,
        #[source]
        source: HtmlError,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "no exit status (killed by signal)".to_string(),
    }
}

/// Runs a named plugin against a source path.
///
/// The production implementation is [`ProcessRunner`]; tests substitute a
/// recording mock.
pub trait PluginRunner {
    /// Run `plugin` on `src`, returning everything it wrote to stdout.
    fn run(&self, plugin: &str, src: &str) -> Result<Vec<u8>, PluginError>;
}

/// Spawns plugin executables as child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    root: PathBuf,
    search_dirs: Vec<PathBuf>,
}

impl ProcessRunner {
    pub fn new(root: impl Into<PathBuf>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            search_dirs,
        }
    }

    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self::new(root, config.plugin_dirs(root))
    }

    /// Program to execute for `plugin`: the first search directory holding
    /// the executable, otherwise the bare name for a `PATH` lookup.
    ///
    /// Paths found in search directories are made absolute because the
    /// child runs in the project root, not in our working directory.
    pub fn program(&self, plugin: &str) -> PathBuf {
        let name = naming::plugin_command(plugin);
        self.search_dirs
            .iter()
            .map(|dir| dir.join(&name))
            .find(|candidate| is_executable(candidate))
            .map(|found| std::path::absolute(&found).unwrap_or(found))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

/// A regular file the current platform can execute. On Unix that means any
/// execute bit is set; a plain data file falls through to `PATH`.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl PluginRunner for ProcessRunner {
    fn run(&self, plugin: &str, src: &str) -> Result<Vec<u8>, PluginError> {
        let program = self.program(plugin);
        tracing::debug!(plugin, src, program = %program.display(), "spawning plugin");

        let mut child = Command::new(&program)
            .arg(src)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| PluginError::Spawn {
                plugin: plugin.to_string(),
                program: program.clone(),
                source,
            })?;

        let io_error = |source: io::Error| PluginError::Io {
            plugin: plugin.to_string(),
            source,
        };

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io_error(io::Error::other("stdout was not captured")))?;
        let (tx, rx) = mpsc::channel();
        let reader = thread::spawn(move || {
            let mut captured = Vec::new();
            let result = stdout.read_to_end(&mut captured).map(|_| captured);
            // Fails only when the caller has already given up on this plugin.
            tx.send(result).ok();
        });

        let status = child.wait().map_err(io_error)?;
        let captured = rx
            .recv()
            .map_err(|_| io_error(io::Error::other("stdout reader stopped without a result")))?;
        reader.join().ok();
        let output = captured.map_err(io_error)?;

        if !status.success() {
            return Err(PluginError::Failed {
                plugin: plugin.to_string(),
                src: src.to_string(),
                code: status.code(),
            });
        }
        tracing::debug!(plugin, src, bytes = output.len(), "plugin finished");
        Ok(output)
    }
}

/// Run a plugin and parse its output into nodes ready to splice.
pub fn invoke<R: PluginRunner + ?Sized>(
    runner: &R,
    plugin: &str,
    src: &str,
) -> Result<Vec<Node>, PluginError> {
    let output = runner.run(plugin, src)?;
    let doc = Document::parse_bytes(&output).map_err(|source| PluginError::Output {
        plugin: plugin.to_string(),
        src: src.to_string(),
        source,
    })?;
    Ok(doc.into_fragment())
}
