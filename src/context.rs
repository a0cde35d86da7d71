//! Per-page render context.
//!
//! A [`PageContext`] is what every template sees as its root namespace:
//!
//! | Name | Value |
//! |------|-------|
//! | `body` | rendered page body (layout only), not escaped |
//! | `title` | page `title` override, else the first `<h1>` text |
//! | `first_title` | first `<h1>` text |
//! | `path` | source path relative to the project root |
//! | `url` | `/` + `path` |
//! | `permalink` | `site.baseurl` + `url` |
//! | `language` | `get("language")` |
//! | `page`, `directory`, `site` | the three metadata layers |
//! | `get(key)` | page → directory → `/site/<key>`, first hit wins |
//! | `config(path)` | any config value by slash path, no override chain |
//!
//! The context holds shared references to the config and directory metadata;
//! only the page layer and body belong to it.

use minijinja::Value;
use minijinja::value::{Enumerator, Object};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::naming;
use crate::types::Metadata;

const FIELDS: &[&str] = &[
    "body",
    "title",
    "first_title",
    "path",
    "url",
    "permalink",
    "language",
    "page",
    "directory",
    "site",
    "get",
    "config",
];

#[derive(Debug, Clone)]
pub struct PageContext {
    path: String,
    url: String,
    permalink: String,
    body: Option<String>,
    first_title: Option<String>,
    config: Arc<Config>,
    directory: Option<Arc<Metadata>>,
    page: Arc<Metadata>,
}

impl PageContext {
    /// Context for expanding a source file: no body, empty page layer.
    pub fn new(rel: &Path, config: Arc<Config>, directory: Option<Arc<Metadata>>) -> Self {
        let url = naming::url_path(rel);
        let permalink = naming::permalink(&config.settings().site.baseurl, &url);
        Self {
            path: naming::slash_path(rel),
            url,
            permalink,
            body: None,
            first_title: None,
            config,
            directory,
            page: Arc::new(Metadata::default()),
        }
    }

    pub fn with_page(mut self, page: Metadata) -> Self {
        self.page = Arc::new(page);
        self
    }

    pub fn with_body(mut self, body: String, first_title: Option<String>) -> Self {
        self.body = Some(body);
        self.first_title = first_title;
        self
    }

    /// Page, then directory, then the site section. Keys match exactly.
    pub fn resolve(&self, key: &str) -> Option<&JsonValue> {
        self.page
            .get(key)
            .or_else(|| self.directory.as_deref().and_then(|dir| dir.get(key)))
            .or_else(|| self.config.site_value(key))
    }

    /// Raw config accessor, bypassing page and directory layers.
    pub fn config_value(&self, path: &str) -> Option<&JsonValue> {
        self.config.lookup(path)
    }

    /// Explicit page title wins over the detected heading.
    pub fn title(&self) -> Option<String> {
        self.page
            .get_str("title")
            .map(str::to_string)
            .or_else(|| self.first_title.clone())
    }

    pub fn language(&self) -> Option<&str> {
        self.resolve("language").and_then(JsonValue::as_str)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn permalink(&self) -> &str {
        &self.permalink
    }

    pub fn into_value(self) -> Value {
        Value::from_object(self)
    }
}

impl Object for PageContext {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let value = match key.as_str()? {
            "body" => Value::from_safe_string(self.body.clone()?),
            "title" => Value::from(self.title()?),
            "first_title" => Value::from(self.first_title.clone()?),
            "path" => Value::from(self.path.as_str()),
            "url" => Value::from(self.url.as_str()),
            "permalink" => Value::from(self.permalink.as_str()),
            "language" => Value::from(self.language()?),
            "page" => Value::from_serialize(self.page.as_ref()),
            "directory" => match &self.directory {
                Some(directory) => Value::from_serialize(directory.as_ref()),
                None => Value::from_serialize(Metadata::default()),
            },
            "site" => Value::from_serialize(self.config.lookup("/site")?),
            "get" => {
                let ctx = Arc::clone(self);
                Value::from_function(move |key: String| {
                    ctx.resolve(&key).map(Value::from_serialize).unwrap_or(Value::UNDEFINED)
                })
            }
            "config" => {
                let ctx = Arc::clone(self);
                Value::from_function(move |path: String| {
                    ctx.config_value(&path)
                        .map(Value::from_serialize)
                        .unwrap_or(Value::UNDEFINED)
                })
            }
            _ => return None,
        };
        Some(value)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(FIELDS)
    }
}
