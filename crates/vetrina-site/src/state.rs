//! Application state shared across all request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::notify::{Mailer, Notifier, SmtpMailer};
use crate::render::Renderer;
use crate::resolve::Resolver;
use crate::spam::SpamGate;

/// Upper bound on one CAPTCHA verification call.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state available to all request handlers.
///
/// Everything inside is immutable after construction; requests share it
/// read-only.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,

    /// Candidate-path resolver over the two content roots.
    pub resolver: Arc<Resolver>,

    /// Template engine bound to the dynamic root.
    pub renderer: Arc<Renderer>,

    /// Contact-form acceptance gate.
    pub spam_gate: Arc<SpamGate>,

    /// Contact-mail dispatcher.
    pub notifier: Arc<Notifier>,
}

impl AppState {
    /// Create application state with the SMTP mail transport.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let mailer = Arc::new(SmtpMailer::from_config(&config)?);
        Self::with_mailer(config, mailer)
    }

    /// Create application state with a caller-supplied mail transport.
    pub fn with_mailer(config: Config, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let http = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()?;

        let resolver = Arc::new(Resolver::new(
            config.templates_dir.clone(),
            config.static_templates_dir.clone(),
        ));
        let renderer = Arc::new(Renderer::new(
            config.templates_dir.clone(),
            &config.date_time_format,
        ));
        let spam_gate = Arc::new(SpamGate::new(config.clone(), http));
        let notifier = Arc::new(Notifier::new(config.clone(), mailer));

        tracing::info!(
            environment = config.environment.as_str(),
            email_send = config.email_send,
            "application state initialized"
        );

        Ok(Self {
            config,
            resolver,
            renderer,
            spam_gate,
            notifier,
        })
    }
}
