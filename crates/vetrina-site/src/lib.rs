//! Vetrina - a small content-serving web application.
//!
//! Resolves an arbitrary URL path against two content roots (dynamic
//! templates and pre-rendered static templates) and answers with either a
//! server-rendered page or a raw file stream. A single contact form is
//! processed inline: submissions pass an anti-automation gate and, when
//! accepted, are forwarded by email to the site owner.
//!
//! # Architecture
//!
//! - **Resolve**: builds the ordered candidate list for a logical path and
//!   probes the filesystem for the first match
//! - **Sniff**: classifies the matched file by content signature, never by
//!   file extension
//! - **Spam gate / Notify**: contact-form acceptance and mail dispatch,
//!   both converted to outcome values at their own boundary
//! - **Dispatch**: the request pipeline composing the above
//!
//! # URL Pattern
//!
//! ```text
//! GET|POST /{any path}
//! ```
//!
//! An empty path serves `index.html`. `/favicon.ico` is a fixed shortcut
//! that bypasses resolution.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod notify;
pub mod render;
pub mod resolve;
pub mod routes;
pub mod sniff;
pub mod spam;
pub mod state;

pub use config::Config;
pub use routes::router;
pub use state::AppState;
