//! Application configuration loaded from environment variables.
//!
//! The configuration is built once at startup and injected into every
//! component through [`crate::state::AppState`]; nothing reads the process
//! environment after boot.

use std::path::PathBuf;

/// Deployment tier. Controls email defaults and live CAPTCHA verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse a tier name; anything unrecognized falls back to development.
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            _ => Self::Development,
        }
    }

    /// Tier name as it appears in template context and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "127.0.0.1:5000").
    pub bind_addr: String,

    /// Deployment tier.
    pub environment: Environment,

    /// Whether accepted contact submissions are actually emailed.
    pub email_send: bool,

    /// Site label used as sender display name and in template context.
    pub website: String,

    /// SMTP relay host.
    pub mail_server: String,

    /// SMTP relay port (implicit TLS).
    pub mail_port: u16,

    /// SMTP credentials.
    pub mail_username: String,
    pub mail_password: String,

    /// Sender address for outgoing contact mail.
    pub email_sender: String,

    /// Destination address and display name for contact mail.
    pub email_dest: String,
    pub email_dest_name: String,

    /// Secret key posted to the CAPTCHA verification service.
    pub recaptcha_secret: String,

    /// Public site key exposed to templates.
    pub recaptcha_site_key: String,

    /// Root of the dynamic (rendered) templates.
    pub templates_dir: PathBuf,

    /// Root of the pre-rendered static templates, streamed verbatim.
    pub static_templates_dir: PathBuf,

    /// Directory holding the favicon.
    pub images_dir: PathBuf,

    /// strftime-style formats used by template helpers.
    pub date_format: String,
    pub date_time_format: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional and default to a local development setup:
    ///
    /// - `BIND_ADDR`: server bind address (default: "127.0.0.1:5000")
    /// - `APPLICATION_ENV`: development | staging | production
    /// - `EMAIL_SEND`: overrides the tier default (off in development,
    ///   on in staging and production)
    /// - `WEBSITE`: site label (default: "www.example.com")
    /// - `MAIL_SERVER` / `MAIL_PORT` / `MAIL_USERNAME` / `MAIL_PASSWORD`
    /// - `EMAIL_SENDER` / `EMAIL_DEST` / `EMAIL_DEST_NAME`
    /// - `RECAPTCHA_V3_SECRET_KEY` / `RECAPTCHA_V3_PUBLIC_KEY`
    /// - `TEMPLATES_PATH` / `STATIC_TEMPLATES_PATH` / `IMAGES_PATH`
    /// - `DATE_FORMAT` / `DATE_TIME_FORMAT`
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env_or("BIND_ADDR", "127.0.0.1:5000");

        let environment = Environment::parse(&env_or("APPLICATION_ENV", "development"));

        // Development defaults to not sending; staging and production do.
        let email_send =
            env_flag("EMAIL_SEND").unwrap_or(environment != Environment::Development);

        let website = env_or("WEBSITE", "www.example.com");

        let mail_server = env_or("MAIL_SERVER", "smtp.gmail.com");
        let mail_port: u16 = env_or("MAIL_PORT", "465").trim().parse()?;
        let mail_username = env_or("MAIL_USERNAME", "");
        let mail_password = env_or("MAIL_PASSWORD", "");

        let email_sender = env_or("EMAIL_SENDER", "noreply@example.com");
        let email_dest = env_or("EMAIL_DEST", "owner@example.com");
        let email_dest_name = env_or("EMAIL_DEST_NAME", "Site Owner");

        let recaptcha_secret = env_or("RECAPTCHA_V3_SECRET_KEY", "no-secret-key-set");
        let recaptcha_site_key = env_or("RECAPTCHA_V3_PUBLIC_KEY", "no-public-key-set");

        let templates_dir = PathBuf::from(env_or("TEMPLATES_PATH", "templates"));
        let static_templates_dir =
            PathBuf::from(env_or("STATIC_TEMPLATES_PATH", "static-templates"));
        let images_dir = PathBuf::from(env_or("IMAGES_PATH", "static/images"));

        let date_format = env_or("DATE_FORMAT", "%Y-%m-%d");
        let date_time_format = env_or("DATE_TIME_FORMAT", "%Y-%m-%d %H:%M:%S");

        // Secrets and credentials are deliberately left out of the summary.
        tracing::info!(
            bind_addr = %bind_addr,
            environment = environment.as_str(),
            email_send,
            website = %website,
            templates_dir = %templates_dir.display(),
            static_templates_dir = %static_templates_dir.display(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            environment,
            email_send,
            website,
            mail_server,
            mail_port,
            mail_username,
            mail_password,
            email_sender,
            email_dest,
            email_dest_name,
            recaptcha_secret,
            recaptcha_site_key,
            templates_dir,
            static_templates_dir,
            images_dir,
            date_format,
            date_time_format,
        })
    }
}

#[cfg(test)]
impl Config {
    /// Baseline development configuration for unit tests.
    pub(crate) fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            environment: Environment::Development,
            email_send: false,
            website: "www.example.com".to_string(),
            mail_server: "localhost".to_string(),
            mail_port: 465,
            mail_username: String::new(),
            mail_password: String::new(),
            email_sender: "noreply@example.com".to_string(),
            email_dest: "owner@example.com".to_string(),
            email_dest_name: "Site Owner".to_string(),
            recaptcha_secret: "secret".to_string(),
            recaptcha_site_key: "site-key".to_string(),
            templates_dir: "templates".into(),
            static_templates_dir: "static-templates".into(),
            images_dir: "static/images".into(),
            date_format: "%Y-%m-%d".to_string(),
            date_time_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}
