//! Error types for the page pipeline.
//!
//! Contact-form failures never show up here: the spam gate and the mail
//! dispatcher convert their own failures into outcome values. `PageError`
//! covers only faults of the rendering pipeline itself, and the route layer
//! turns it into the framework 500 page.

/// Page pipeline error type.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// The resolved template file disappeared between probe and render.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// Template parsing or rendering failed.
    #[error("template render failed: {0}")]
    Render(#[from] handlebars::RenderError),

    /// Filesystem error while reading resolved content.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else unexpected.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
