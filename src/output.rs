//! CLI output formatting for builds and checks.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Pages
//! 001 index.md
//! 002 docs/guide.md
//!
//! Files
//! 001 static/logo.png
//!
//! Warnings
//!     about.html: page metadata ignored: ...
//!
//! Failed
//!     docs/diagram.html: embed error: plugin 'graphviz' failed on g.dot with exit status 1
//!
//! Built 2 pages, 1 file, 2 directories (3 probed, 1 cached), 1 failed
//! ```
//!
//! Empty sections are omitted. Paths are relative to the project root with
//! `/` separators, in walk order.
//!
//! ## Check
//!
//! ```text
//! Checked 2 pages, 1 file, 2 directories
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use std::path::PathBuf;

use crate::generate::{BuildReport, CheckReport, FileIssue};
use crate::naming;

/// Longest issue message shown before truncation.
const MESSAGE_WIDTH: usize = 160;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 page`, `2 pages`.
fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn path_section(lines: &mut Vec<String>, heading: &str, paths: &[PathBuf]) {
    if paths.is_empty() {
        return;
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(heading.to_string());
    for (i, path) in paths.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), naming::slash_path(path)));
    }
}

fn issue_section(lines: &mut Vec<String>, heading: &str, issues: &[FileIssue]) {
    if issues.is_empty() {
        return;
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(heading.to_string());
    for issue in issues {
        // Multi-line messages (template errors) are folded onto one line.
        let message = issue.message.split_whitespace().collect::<Vec<_>>().join(" ");
        lines.push(format!(
            "{}{}: {}",
            indent(1),
            naming::slash_path(&issue.path),
            truncate(&message, MESSAGE_WIDTH)
        ));
    }
}

// ============================================================================
// Build output
// ============================================================================

pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();
    path_section(&mut lines, "Pages", &report.rendered);
    path_section(&mut lines, "Files", &report.copied);
    issue_section(&mut lines, "Warnings", &report.warnings);
    issue_section(&mut lines, "Failed", &report.failed);

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let mut summary = format!(
        "Built {}, {}, {} ({})",
        count(report.rendered.len(), "page", "pages"),
        count(report.copied.len(), "file", "files"),
        count(report.directories, "directory", "directories"),
        report.cache
    );
    if !report.failed.is_empty() {
        summary.push_str(&format!(", {} failed", report.failed.len()));
    }
    lines.push(summary);
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

pub fn format_check_output(report: &CheckReport) -> Vec<String> {
    vec![format!(
        "Checked {}, {}, {}",
        count(report.pages, "page", "pages"),
        count(report.files, "file", "files"),
        count(report.directories, "directory", "directories"),
    )]
}

pub fn print_check_output(report: &CheckReport) {
    for line in format_check_output(report) {
        println!("{}", line);
    }
}
