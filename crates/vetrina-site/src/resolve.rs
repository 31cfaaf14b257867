//! Candidate-path resolution across the two content roots.
//!
//! A logical path expands into exactly six candidate locations, probed in a
//! fixed order: the raw path and its `.htm`/`.html` variants under the
//! dynamic templates root, then the same three under the static templates
//! root. The first candidate that exists on disk wins. A miss on all six is
//! a normal outcome, reported as [`Resolution::NotFound`] rather than an
//! error.

use std::path::{Component, Path, PathBuf};

/// Suffix tiers tried for each root, in priority order.
const SUFFIXES: [&str; 3] = ["", ".htm", ".html"];

/// Which content root a candidate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    /// Matched files are passed through the template renderer.
    Dynamic,
    /// Matched files are streamed verbatim.
    Static,
}

/// One of the six probe locations generated for a logical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub root: Root,
    /// Path relative to its root, suffix included. This is the identifier
    /// handed to the renderer for dynamic matches.
    pub rel: String,
    /// Filesystem location to probe.
    pub path: PathBuf,
}

/// Outcome of probing the candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Candidate),
    NotFound,
}

/// Resolves logical request paths against the two content roots.
#[derive(Debug, Clone)]
pub struct Resolver {
    templates_dir: PathBuf,
    static_templates_dir: PathBuf,
}

impl Resolver {
    pub fn new(templates_dir: PathBuf, static_templates_dir: PathBuf) -> Self {
        Self {
            templates_dir,
            static_templates_dir,
        }
    }

    /// Build the six candidates for a logical path, in probe order.
    pub fn candidates(&self, logical: &str) -> Vec<Candidate> {
        let roots = [
            (Root::Dynamic, &self.templates_dir),
            (Root::Static, &self.static_templates_dir),
        ];
        roots
            .iter()
            .flat_map(|(root, dir)| {
                SUFFIXES.iter().map(move |suffix| {
                    let rel = format!("{logical}{suffix}");
                    Candidate {
                        root: *root,
                        path: dir.join(&rel),
                        rel,
                    }
                })
            })
            .collect()
    }

    /// Probe the candidates in order and return the first hit.
    ///
    /// Logical paths that would escape their root (`..` segments, absolute
    /// paths) are refused up front and resolve to [`Resolution::NotFound`].
    pub fn resolve(&self, logical: &str) -> Resolution {
        if !is_confined(logical) {
            tracing::warn!(path = %logical, "refusing non-confined logical path");
            return Resolution::NotFound;
        }

        self.candidates(logical)
            .into_iter()
            .find(|candidate| candidate.path.exists())
            .map_or(Resolution::NotFound, Resolution::Found)
    }
}

/// A logical path is confined when every component is a plain name.
fn is_confined(logical: &str) -> bool {
    !logical.is_empty()
        && Path::new(logical)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
