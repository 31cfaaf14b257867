//! Catch-all page handler.
//!
//! Reduces the HTTP request to a [`PageRequest`], runs the dispatch
//! pipeline and writes the reply. Framework-level failures (missing
//! favicon, pipeline faults) are answered with the dedicated status
//! templates, or a short plain string when the client sent a JSON-typed
//! request.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use crate::dispatch::{self, PageRequest, PageReply};
use crate::state::AppState;

/// Content type of the plain textual replies.
const HTML_UTF8: &str = "text/html; charset=utf-8";

/// Handle any `GET`/`POST` page request.
pub async fn page_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    path: Option<Path<String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let is_post = method == Method::POST;
    let form = if is_post {
        parse_form(&headers, &body)
    } else {
        HashMap::new()
    };

    let request = PageRequest {
        is_post,
        path: path.map(|Path(p)| p).unwrap_or_default(),
        remote_addr: client_addr(&headers, Some(peer.ip())),
        form,
    };

    match dispatch::handle(&state, request).await {
        Ok(PageReply::Rendered { html, content_type }) => (
            [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
            html,
        )
            .into_response(),
        Ok(PageReply::Stream { path, content_type }) => {
            stream_file(&state, &headers, path, content_type).await
        }
        Ok(PageReply::NotFound) => plain_page(dispatch::NOT_FOUND_TEXT),
        Ok(PageReply::Unsupported) => plain_page(dispatch::UNSUPPORTED_TEXT),
        Err(err) => {
            tracing::error!(error = %err, "page pipeline failed");
            status_page(&state, &headers, StatusCode::INTERNAL_SERVER_ERROR).await
        }
    }
}

/// Stream a static file with its sniffed content type. The handle stays
/// scoped to the response body and is released when the stream is dropped,
/// client disconnects included.
async fn stream_file(
    state: &AppState,
    headers: &HeaderMap,
    path: std::path::PathBuf,
    content_type: &'static str,
) -> Response {
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "resolved file unreadable");
            return status_page(state, headers, StatusCode::INTERNAL_SERVER_ERROR).await;
        }
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type),
    );
    if let Ok(meta) = file.metadata().await {
        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.len()));
    }

    let stream = ReaderStream::new(file);
    (StatusCode::OK, response_headers, Body::from_stream(stream)).into_response()
}

/// The terminal textual replies carry an implicit 200; only framework
/// failures get an error status.
fn plain_page(text: &'static str) -> Response {
    ([(header::CONTENT_TYPE, HTML_UTF8)], text).into_response()
}

/// Render a framework status page (`http_statuses/{code}.html` under the
/// dynamic root), falling back to a fixed plain string when the template
/// is missing or the client asked for JSON.
pub(crate) async fn status_page(
    state: &AppState,
    headers: &HeaderMap,
    status: StatusCode,
) -> Response {
    let fallback = match status {
        StatusCode::FORBIDDEN => "Oops! You don't have permission to access this page.",
        StatusCode::NOT_FOUND => "Ooops! Page not found.",
        _ => "Oops! Internal server error. Please try after sometime.",
    };

    if wants_json(headers) {
        return (status, fallback).into_response();
    }

    let rel = format!("http_statuses/{}.html", status.as_u16());
    match state.renderer.render(&rel, &dispatch::status_context(state)) {
        Ok(html) => (status, [(header::CONTENT_TYPE, HTML_UTF8)], html).into_response(),
        Err(err) => {
            tracing::debug!(template = %rel, error = %err, "status template unavailable");
            (status, fallback).into_response()
        }
    }
}

/// The client sent a JSON-typed request body.
fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_lowercase().contains("application/json"))
}

/// Client address as seen through the proxy layer: first `x-forwarded-for`
/// entry when present, socket peer otherwise.
fn client_addr(headers: &HeaderMap, connect_ip: Option<IpAddr>) -> String {
    forwarded_ip(headers)
        .or(connect_ip)
        .map(|ip| ip.to_string())
        .unwrap_or_default()
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<IpAddr>().ok())
}

/// Decode an urlencoded POST body. Anything else (other content types,
/// malformed bodies) yields an empty form, which the pipeline treats as a
/// non-contact request.
fn parse_form(headers: &HeaderMap, body: &Bytes) -> HashMap<String, String> {
    let is_urlencoded = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .to_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        });
    if !is_urlencoded {
        return HashMap::new();
    }

    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn forwarded_ip_takes_first_entry() {
        let headers = header_map(&[("x-forwarded-for", "10.0.0.1, 172.16.0.9")]);
        assert_eq!(forwarded_ip(&headers), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn forwarded_ip_ignores_garbage() {
        let headers = header_map(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(forwarded_ip(&headers), None);
    }

    #[test]
    fn client_addr_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer: IpAddr = "192.0.2.7".parse().unwrap();
        assert_eq!(client_addr(&headers, Some(peer)), "192.0.2.7");
    }

    #[test]
    fn forwarded_entry_overrides_peer() {
        let headers = header_map(&[("x-forwarded-for", "10.0.0.1")]);
        let peer: IpAddr = "192.0.2.7".parse().unwrap();
        assert_eq!(client_addr(&headers, Some(peer)), "10.0.0.1");
    }

    #[test]
    fn wants_json_checks_request_content_type() {
        assert!(wants_json(&header_map(&[(
            "content-type",
            "application/json; charset=utf-8"
        )])));
        assert!(!wants_json(&header_map(&[(
            "content-type",
            "application/x-www-form-urlencoded"
        )])));
        assert!(!wants_json(&HeaderMap::new()));
    }

    #[test]
    fn parse_form_decodes_urlencoded_bodies() {
        let headers = header_map(&[("content-type", "application/x-www-form-urlencoded")]);
        let body = Bytes::from_static(b"form-name=mail-contact-form&check=2&subject=Ciao");

        let form = parse_form(&headers, &body);
        assert_eq!(
            form.get("form-name").map(String::as_str),
            Some("mail-contact-form")
        );
        assert_eq!(form.get("check").map(String::as_str), Some("2"));
        assert_eq!(form.get("subject").map(String::as_str), Some("Ciao"));
    }

    #[test]
    fn parse_form_ignores_other_content_types() {
        let headers = header_map(&[("content-type", "application/json")]);
        let body = Bytes::from_static(b"{\"check\": 2}");
        assert!(parse_form(&headers, &body).is_empty());
    }

    #[test]
    fn parse_form_tolerates_malformed_bodies() {
        let headers = header_map(&[("content-type", "application/x-www-form-urlencoded")]);
        let body = Bytes::from_static(&[0xFF, 0xFE, 0x00]);
        assert!(parse_form(&headers, &body).is_empty());
    }
}
