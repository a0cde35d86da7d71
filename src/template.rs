//! Template rendering.
//!
//! Every source file is a Jinja template expanded against its
//! [`PageContext`]; the shared layout is compiled once per build and
//! rendered last for each page. HTML sources and the layout are HTML-escaped
//! unless a value is marked safe. Markdown sources are not: their expanded
//! text still goes through Markdown conversion, which escapes on its own.
//! Missing values render as empty strings.

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::context::PageContext;

const LAYOUT: &str = "layout";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("cannot read layout {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("layout {} does not compile: {source}", path.display())]
    Layout {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },
}

/// Escaping mode for a template, chosen by its name.
fn escape_for(name: &str) -> AutoEscape {
    if name.ends_with(".md") {
        AutoEscape::None
    } else {
        AutoEscape::Html
    }
}

pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Renderer with `source` as the layout. A layout that does not compile
    /// is reported here, before any page is rendered.
    pub fn new(layout: String) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(escape_for);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        env.add_template_owned(LAYOUT, layout)?;
        Ok(Self { env })
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let layout = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(layout).map_err(|source| TemplateError::Layout {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Compile and execute a page source in one step. `name` shows up in
    /// error messages.
    pub fn render_source(
        &self,
        name: &str,
        source: &str,
        ctx: PageContext,
    ) -> Result<String, minijinja::Error> {
        self.env.render_named_str(name, source, ctx.into_value())
    }

    pub fn render_layout(&self, ctx: PageContext) -> Result<String, minijinja::Error> {
        self.env.get_template(LAYOUT)?.render(ctx.into_value())
    }
}
