//! Template rendering over the dynamic content root.
//!
//! Templates are plain files read from the dynamic root on demand, keyed by
//! the path the resolver matched (suffix included). Rendering a path whose
//! file does not exist fails with [`PageError::TemplateNotFound`]; the
//! resolver's existence probe is the authoritative check, so in practice
//! that only happens when a file disappears between probe and render.

pub mod helpers;

use std::path::PathBuf;

use handlebars::Handlebars;

use crate::error::PageError;

/// Template engine bound to the dynamic templates root.
pub struct Renderer {
    hb: Handlebars<'static>,
    root: PathBuf,
}

impl Renderer {
    /// Create a renderer rooted at the dynamic templates directory, with
    /// all site helpers registered.
    pub fn new(root: PathBuf, date_time_format: &str) -> Self {
        let mut hb = Handlebars::new();
        helpers::register(&mut hb, date_time_format);
        Self { hb, root }
    }

    /// Render the template at `rel` (relative to the dynamic root) with the
    /// given variables.
    pub fn render(&self, rel: &str, vars: &serde_json::Value) -> Result<String, PageError> {
        let path = self.root.join(rel);
        let source = std::fs::read_to_string(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                PageError::TemplateNotFound(rel.to_string())
            } else {
                PageError::Io(err)
            }
        })?;

        Ok(self.hb.render_template(&source, vars)?)
    }
}
