//! Request pipeline: form processing, content resolution, response assembly.
//!
//! The pipeline is a fixed sequence of states:
//!
//! ```text
//! Start → FormCheck → [SpamGate → Dispatch] → Resolve → Sniff → Respond
//! ```
//!
//! The bracketed states run only for POSTs that identify themselves as the
//! contact form; their outcome never short-circuits the rest. Content
//! resolution always runs, and the submission outcome reaches the page only
//! as the `error_code`/`error_msg` template variables.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::json;

use crate::error::PageError;
use crate::notify::DispatchOutcome;
use crate::resolve::{Resolution, Root};
use crate::sniff;
use crate::spam::Verdict;
use crate::state::AppState;

/// Form-identity marker that triggers contact processing.
pub const CONTACT_FORM_NAME: &str = "mail-contact-form";

/// Logical path served for the empty path.
pub const DEFAULT_PAGE: &str = "index.html";

/// Body of the terminal not-found reply.
pub const NOT_FOUND_TEXT: &str = "Not found";

/// Body of the unsupported-content reply.
pub const UNSUPPORTED_TEXT: &str = "MIME type not supported for this file.";

/// Message attached to a spam-gate rejection.
pub const ROBOT_CHECK_FAILED: &str = "Robot check validation failed.";

/// One inbound request, reduced to what the pipeline needs.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub is_post: bool,
    /// Logical path from the URL, no leading slash; empty for `/`.
    pub path: String,
    /// Client address as seen through the proxy layer.
    pub remote_addr: String,
    /// Decoded form fields; empty for GETs and non-form bodies.
    pub form: HashMap<String, String>,
}

impl PageRequest {
    fn field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }
}

/// Result of one contact-form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted,
    RejectedSpam,
    SendFailed(String),
}

/// Error state injected into the template context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorState {
    /// 0 = none, 1 = delivery error, 2 = validation error.
    pub code: u8,
    pub message: String,
}

impl ErrorState {
    fn from_outcome(outcome: Option<&SubmissionOutcome>) -> Self {
        match outcome {
            None | Some(SubmissionOutcome::Accepted) => Self {
                code: 0,
                message: String::new(),
            },
            Some(SubmissionOutcome::SendFailed(reason)) => Self {
                code: 1,
                message: reason.clone(),
            },
            Some(SubmissionOutcome::RejectedSpam) => Self {
                code: 2,
                message: ROBOT_CHECK_FAILED.to_string(),
            },
        }
    }
}

/// What the route layer should answer with.
#[derive(Debug)]
pub enum PageReply {
    /// A rendered dynamic template.
    Rendered {
        html: String,
        content_type: &'static str,
    },
    /// A static file to stream verbatim.
    Stream {
        path: PathBuf,
        content_type: &'static str,
    },
    /// No candidate resolved.
    NotFound,
    /// A candidate resolved but its content type is undetectable.
    Unsupported,
}

/// Run the full pipeline for one request.
pub async fn handle(state: &AppState, req: PageRequest) -> Result<PageReply, PageError> {
    // FormCheck → SpamGate → Dispatch
    let outcome = process_form(state, &req).await;
    let error_state = ErrorState::from_outcome(outcome.as_ref());

    // Resolve: unconditional, whatever the form outcome was.
    let logical = if req.path.is_empty() {
        DEFAULT_PAGE
    } else {
        req.path.as_str()
    };

    let candidate = match state.resolver.resolve(logical) {
        Resolution::NotFound => return Ok(PageReply::NotFound),
        Resolution::Found(candidate) => candidate,
    };

    // Sniff: content decides the type, the extension never does.
    let Some(content_type) = sniff::sniff(&candidate.path)? else {
        tracing::debug!(path = %candidate.path.display(), "no content type detected");
        return Ok(PageReply::Unsupported);
    };

    // Respond
    match candidate.root {
        Root::Dynamic => {
            let vars = template_context(state, &req.remote_addr, &error_state);
            let html = state.renderer.render(&candidate.rel, &vars)?;
            Ok(PageReply::Rendered { html, content_type })
        }
        Root::Static => Ok(PageReply::Stream {
            path: candidate.path,
            content_type,
        }),
    }
}

/// Contact-form branch. `None` when the request is not a contact
/// submission; the gate and the dispatcher never raise past this point.
async fn process_form(state: &AppState, req: &PageRequest) -> Option<SubmissionOutcome> {
    if !req.is_post || req.field("form-name") != Some(CONTACT_FORM_NAME) {
        return None;
    }

    let verdict = state
        .spam_gate
        .evaluate(
            &req.remote_addr,
            req.field("check"),
            req.field("g-recaptcha-response"),
        )
        .await;

    if verdict == Verdict::Reject {
        return Some(SubmissionOutcome::RejectedSpam);
    }

    let subject = req.field("subject").unwrap_or_default();
    let message = req.field("message").unwrap_or_default();

    match state
        .notifier
        .dispatch(subject, message, &req.remote_addr)
        .await
    {
        DispatchOutcome::Sent => Some(SubmissionOutcome::Accepted),
        DispatchOutcome::Failed(reason) => Some(SubmissionOutcome::SendFailed(reason)),
    }
}

/// Site-wide globals every template sees.
fn site_globals(state: &AppState) -> serde_json::Map<String, serde_json::Value> {
    let config = &state.config;
    let now = Utc::now();

    let mut globals = serde_json::Map::new();
    globals.insert("website".into(), json!(config.website));
    globals.insert("base_url".into(), json!("/"));
    globals.insert("application_env".into(), json!(config.environment.as_str()));
    globals.insert("now".into(), json!(now.timestamp()));
    globals.insert(
        "current_date".into(),
        json!(now.format(&config.date_time_format).to_string()),
    );
    globals.insert(
        "recaptcha_site_key".into(),
        json!(config.recaptcha_site_key),
    );
    globals
}

/// Full context for a page render: globals, the per-request checksum hint
/// and the submission error state.
pub fn template_context(
    state: &AppState,
    remote_addr: &str,
    error_state: &ErrorState,
) -> serde_json::Value {
    let mut vars = site_globals(state);
    vars.insert("check_ip".into(), json!(check_ip_digits(remote_addr)));
    vars.insert("error_code".into(), json!(error_state.code));
    vars.insert("error_msg".into(), json!(error_state.message));
    serde_json::Value::Object(vars)
}

/// Context for framework status pages (no request-specific fields).
pub fn status_context(state: &AppState) -> serde_json::Value {
    serde_json::Value::Object(site_globals(state))
}

/// First character of each address segment, as the contact form's
/// client-side checksum hint.
fn check_ip_digits(addr: &str) -> Vec<String> {
    addr.split('.')
        .filter_map(|segment| segment.chars().next())
        .map(|c| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use lettre::Message;
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::notify::Mailer;

    struct RecordingMailer {
        sent: Mutex<Vec<Message>>,
    }

    impl RecordingMailer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: Message) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _message: Message) -> anyhow::Result<()> {
            anyhow::bail!("relay unavailable")
        }
    }

    struct Fixture {
        state: AppState,
        recorder: Arc<RecordingMailer>,
        dynamic: TempDir,
        fixed: TempDir,
    }

    fn fixture(email_send: bool) -> Fixture {
        let dynamic = TempDir::new().unwrap();
        let fixed = TempDir::new().unwrap();

        let mut config = Config::for_tests();
        config.email_send = email_send;
        config.templates_dir = dynamic.path().to_path_buf();
        config.static_templates_dir = fixed.path().to_path_buf();

        let recorder = RecordingMailer::new();
        let state = AppState::with_mailer(config, recorder.clone()).unwrap();

        Fixture {
            state,
            recorder,
            dynamic,
            fixed,
        }
    }

    fn get(path: &str) -> PageRequest {
        PageRequest {
            is_post: false,
            path: path.to_string(),
            remote_addr: "10.0.0.1".to_string(),
            form: HashMap::new(),
        }
    }

    fn contact_post(check: &str) -> PageRequest {
        let mut form = HashMap::new();
        form.insert("form-name".to_string(), CONTACT_FORM_NAME.to_string());
        form.insert("check".to_string(), check.to_string());
        form.insert("subject".to_string(), "Ciao".to_string());
        form.insert("message".to_string(), "un saluto".to_string());
        PageRequest {
            is_post: true,
            path: String::new(),
            remote_addr: "10.0.0.1".to_string(),
            form,
        }
    }

    const ERROR_PROBE: &str = "<html>{{error_code}}|{{error_msg}}</html>";

    #[tokio::test]
    async fn get_renders_dynamic_template() {
        let fx = fixture(false);
        std::fs::write(
            fx.dynamic.path().join("about.html"),
            "<html><body>{{website}}</body></html>",
        )
        .unwrap();

        match handle(&fx.state, get("about")).await.unwrap() {
            PageReply::Rendered { html, content_type } => {
                assert_eq!(content_type, "text/html");
                assert!(html.contains("www.example.com"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let fx = fixture(false);
        assert!(matches!(
            handle(&fx.state, get("missing-page")).await.unwrap(),
            PageReply::NotFound
        ));
    }

    #[tokio::test]
    async fn static_match_streams_instead_of_rendering() {
        let fx = fixture(false);
        std::fs::write(
            fx.fixed.path().join("raw.html"),
            "<html>{{not_a_template}}</html>",
        )
        .unwrap();

        match handle(&fx.state, get("raw")).await.unwrap() {
            PageReply::Stream { path, content_type } => {
                assert_eq!(content_type, "text/html");
                assert_eq!(path, fx.fixed.path().join("raw.html"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn content_type_follows_sniffed_content() {
        let fx = fixture(false);
        // A dynamic template that is plain text, not HTML.
        std::fs::write(fx.dynamic.path().join("feed.htm"), "plain words {{website}}").unwrap();

        match handle(&fx.state, get("feed")).await.unwrap() {
            PageReply::Rendered { content_type, .. } => assert_eq!(content_type, "text/plain"),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn undetectable_content_is_unsupported() {
        let fx = fixture(false);
        std::fs::write(fx.fixed.path().join("blob"), [0u8, 1, 2, 0, 255]).unwrap();

        assert!(matches!(
            handle(&fx.state, get("blob")).await.unwrap(),
            PageReply::Unsupported
        ));
    }

    #[tokio::test]
    async fn empty_path_serves_index() {
        let fx = fixture(false);
        std::fs::write(fx.dynamic.path().join("index.html"), ERROR_PROBE).unwrap();

        match handle(&fx.state, get("")).await.unwrap() {
            PageReply::Rendered { html, .. } => assert!(html.contains("0|")),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_submission_still_renders_with_error_state() {
        let fx = fixture(false);
        std::fs::write(fx.dynamic.path().join("index.html"), ERROR_PROBE).unwrap();

        // Wrong check value for 10.0.0.1 (expected 2).
        match handle(&fx.state, contact_post("3")).await.unwrap() {
            PageReply::Rendered { html, .. } => {
                assert!(html.contains("2|Robot check validation failed."));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_eq!(fx.recorder.count(), 0);
    }

    #[tokio::test]
    async fn accepted_submission_dispatches_and_renders_clean() {
        let fx = fixture(true);
        std::fs::write(fx.dynamic.path().join("index.html"), ERROR_PROBE).unwrap();

        match handle(&fx.state, contact_post("2")).await.unwrap() {
            PageReply::Rendered { html, .. } => assert!(html.contains("0|")),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_eq!(fx.recorder.count(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_renders_with_reason() {
        let dynamic = TempDir::new().unwrap();
        let fixed = TempDir::new().unwrap();

        let mut config = Config::for_tests();
        config.email_send = true;
        config.templates_dir = dynamic.path().to_path_buf();
        config.static_templates_dir = fixed.path().to_path_buf();

        let state = AppState::with_mailer(config, Arc::new(FailingMailer)).unwrap();
        std::fs::write(dynamic.path().join("index.html"), ERROR_PROBE).unwrap();

        match handle(&state, contact_post("2")).await.unwrap() {
            PageReply::Rendered { html, .. } => {
                assert!(html.contains("1|"));
                assert!(html.contains("relay unavailable"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_contact_post_skips_the_gate() {
        let fx = fixture(true);
        std::fs::write(fx.dynamic.path().join("index.html"), ERROR_PROBE).unwrap();

        let mut req = contact_post("3");
        req.form.remove("form-name");

        match handle(&fx.state, req).await.unwrap() {
            PageReply::Rendered { html, .. } => assert!(html.contains("0|")),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_eq!(fx.recorder.count(), 0);
    }

    #[tokio::test]
    async fn template_fault_propagates_as_page_error() {
        let fx = fixture(false);
        std::fs::write(fx.dynamic.path().join("index.html"), "<html>{{#if}}</html>").unwrap();

        assert!(handle(&fx.state, get("")).await.is_err());
    }

    #[test]
    fn check_ip_digits_take_first_characters() {
        assert_eq!(check_ip_digits("10.0.0.1"), vec!["1", "0", "0", "1"]);
        assert_eq!(check_ip_digits("192.168.1.7"), vec!["1", "1", "1", "7"]);
    }

    #[test]
    fn error_state_mapping() {
        assert_eq!(ErrorState::from_outcome(None).code, 0);
        assert_eq!(
            ErrorState::from_outcome(Some(&SubmissionOutcome::Accepted)).code,
            0
        );
        let failed = SubmissionOutcome::SendFailed("boom".into());
        let state = ErrorState::from_outcome(Some(&failed));
        assert_eq!((state.code, state.message.as_str()), (1, "boom"));
        let rejected = ErrorState::from_outcome(Some(&SubmissionOutcome::RejectedSpam));
        assert_eq!(
            (rejected.code, rejected.message.as_str()),
            (2, ROBOT_CHECK_FAILED)
        );
    }
}
