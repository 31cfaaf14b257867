//! Route definitions.
//!
//! ## Routes
//!
//! - `GET /favicon.ico` - fixed favicon shortcut, bypasses the resolver
//! - `GET|POST /` - index page
//! - `GET|POST /{*path}` - resolved content page

mod page;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use crate::state::AppState;

/// MIME type of the favicon shortcut.
const FAVICON_MIME: &str = "image/vnd.microsoft.icon";

/// Build the complete site router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/favicon.ico", get(favicon))
        .route("/", get(page::page_handler).post(page::page_handler))
        .route("/{*path}", get(page::page_handler).post(page::page_handler))
        .with_state(state)
}

/// Serve the fixed favicon from the images directory.
async fn favicon(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let path = state.config.images_dir.join("favicon.ico");
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, FAVICON_MIME)], bytes).into_response(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "favicon unavailable");
            page::status_page(&state, &headers, StatusCode::NOT_FOUND).await
        }
    }
}
