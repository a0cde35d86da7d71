//! Site configuration module.
//!
//! Handles loading, validating, and merging `.plume/config.toml`. The file is
//! optional and sparse: user values are merged over the stock defaults, the
//! result is validated once, and the [`Config`] is then shared read-only by
//! every stage of the build.
//!
//! ## Config File Location
//!
//! ```text
//! site/
//! ├── .plume/
//! │   ├── config.toml      # Site config (overrides stock defaults)
//! │   ├── layout.html      # Shared layout template
//! │   └── plugins/         # MIME-type plugin executables
//! ├── .plume.yml           # Root directory metadata
//! ├── index.md
//! └── docs/
//!     ├── .plume.yml       # Directory metadata (overrides root for docs/)
//!     └── guide.md
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! [build]
//! deploy = ".plume/deploy"          # Deployment root, wiped on every build
//! layout = ".plume/layout.html"     # Layout template applied to every page
//! metadata_file = ".plume.yml"      # Per-directory metadata file name
//! plugin_dirs = [".plume/plugins"]  # Searched before PATH for plugins
//!
//! [site]
//! baseurl = ""                      # Prefix for permalinks
//! imageurl = ""
//! language = "en"                   # Fallback for the `language` lookup
//!
//! [mimetypes]
//! "text/markdown" = "markdown"      # MIME type → plugin name
//! ```
//!
//! `[build]` rejects unknown keys to catch typos early. `[site]` and any
//! other top-level section are open: templates reach them through
//! `get(key)` (site section) or `config("/section/key")`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::lookup_path;

/// Location of the site configuration, relative to the project root.
pub const CONFIG_FILE: &str = ".plume/config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config conversion error: {0}")]
    Convert(#[from] serde_json::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Typed view of the site configuration.
///
/// All fields have defaults. Extra top-level sections are accepted and kept
/// in [`Config`]'s raw tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Build paths and conventions.
    pub build: BuildConfig,
    /// Site-wide values visible to templates through the resolver.
    pub site: SiteSection,
    /// MIME type → plugin name bindings used by `<embed>` resolution.
    pub mimetypes: BTreeMap<String, String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            site: SiteSection::default(),
            mimetypes: BTreeMap::from([("text/markdown".to_string(), "markdown".to_string())]),
        }
    }
}

impl SiteConfig {
    /// Validate values that would otherwise fail late or destructively.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let build = &self.build;
        for (key, value) in [
            ("build.deploy", &build.deploy),
            ("build.layout", &build.layout),
            ("build.metadata_file", &build.metadata_file),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if Path::new(&build.deploy) == Path::new(".") {
            return Err(ConfigError::Validation(
                "build.deploy must not be the project root".into(),
            ));
        }
        for (mime, plugin) in &self.mimetypes {
            if plugin.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "mimetypes.\"{mime}\" must name a plugin"
                )));
            }
            if plugin.contains(['/', '\\']) {
                return Err(ConfigError::Validation(format!(
                    "mimetypes.\"{mime}\" plugin name '{plugin}' must not contain a path separator"
                )));
            }
        }
        Ok(())
    }
}

/// Build paths, all relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub deploy: String,
    pub layout: String,
    pub metadata_file: String,
    pub plugin_dirs: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            deploy: ".plume/deploy".to_string(),
            layout: ".plume/layout.html".to_string(),
            metadata_file: ".plume.yml".to_string(),
            plugin_dirs: vec![".plume/plugins".to_string()],
        }
    }
}

/// The `[site]` section. Unknown keys are allowed and stay reachable through
/// [`Config::site_value`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub baseurl: String,
    pub imageurl: String,
    pub language: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            baseurl: String::new(),
            imageurl: String::new(),
            language: "en".to_string(),
        }
    }
}

/// Resolved configuration for one build.
///
/// Holds the typed [`SiteConfig`] and the merged raw tree, which keeps every
/// section (including ones the typed view ignores) for slash-path lookups.
#[derive(Debug, Clone)]
pub struct Config {
    settings: SiteConfig,
    raw: Value,
}

impl Default for Config {
    fn default() -> Self {
        // Stock defaults always serialize and validate.
        resolve_config(stock_defaults_value(), None).unwrap_or_else(|_| Self {
            settings: SiteConfig::default(),
            raw: Value::Null,
        })
    }
}

impl Config {
    /// Load `.plume/config.toml` from the project root.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let base = stock_defaults_value();
        let overlay = load_raw_config(root)?;
        resolve_config(base, overlay)
    }

    /// Resolve a config from TOML text merged over the stock defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let overlay: toml::Value = toml::from_str(content)?;
        resolve_config(stock_defaults_value(), Some(overlay))
    }

    pub fn settings(&self) -> &SiteConfig {
        &self.settings
    }

    /// Raw accessor: any value by slash-delimited path, e.g. `/site/baseurl`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.raw, path)
    }

    /// A key of the `[site]` section, including keys the typed view ignores.
    pub fn site_value(&self, key: &str) -> Option<&Value> {
        self.raw.get("site").and_then(|site| site.get(key))
    }

    /// Plugin name registered for a MIME type. Exact, case-sensitive match.
    pub fn plugin_for(&self, mime: &str) -> Option<&str> {
        self.settings.mimetypes.get(mime).map(String::as_str)
    }

    pub fn deploy_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.settings.build.deploy)
    }

    pub fn layout_path(&self, root: &Path) -> PathBuf {
        root.join(&self.settings.build.layout)
    }

    pub fn plugin_dirs(&self, root: &Path) -> Vec<PathBuf> {
        self.settings
            .build
            .plugin_dirs
            .iter()
            .map(|dir| root.join(dir))
            .collect()
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `.plume/config.toml` under a project root as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let raw = serde_json::to_value(&merged)?;
    let settings: SiteConfig = merged.try_into()?;
    settings.validate()?;
    Ok(Config { settings, raw })
}

/// Returns a fully-commented stock `.plume/config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Plume Configuration
# ===================
# Place this file at .plume/config.toml in the project root.
# All settings are optional. Values shown below are the defaults.
# Unknown keys in [build] cause an error.

# ---------------------------------------------------------------------------
# Build
# ---------------------------------------------------------------------------
[build]
# Deployment root. Removed and recreated on every build.
deploy = ".plume/deploy"

# Layout template applied to every rendered page. The rendered page body is
# available as {{ body }}.
layout = ".plume/layout.html"

# Per-directory metadata file. A directory without one inherits the nearest
# ancestor's metadata.
metadata_file = ".plume.yml"

# Directories searched for MIME-type plugins (plume-mime-<name>) before PATH.
plugin_dirs = [".plume/plugins"]

# ---------------------------------------------------------------------------
# Site values, visible to templates through get("key")
# ---------------------------------------------------------------------------
[site]
baseurl = ""
imageurl = ""
language = "en"

# ---------------------------------------------------------------------------
# <embed type="..." src="..."> handlers
# ---------------------------------------------------------------------------
# Maps a MIME type to a plugin name. "markdown" is built in; any other name
# runs the executable plume-mime-<name> with the embedded path as argument.
[mimetypes]
"text/markdown" = "markdown"
"##
}
