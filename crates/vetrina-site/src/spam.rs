//! Contact-form anti-automation gate.
//!
//! Two acceptance paths:
//!
//! - **Checksum** (always evaluated): the sum of the first digit of each
//!   dot-separated segment of the client address must equal the `check`
//!   form field. Trivially forgeable; it only filters non-interactive bots.
//! - **Assertion** (only when email sending is enabled and the tier is
//!   production): the client token is verified against the external CAPTCHA
//!   service.
//!
//! The paths combine as `(live AND verified AND checksum) OR checksum`: a
//! negative verification verdict falls back to the checksum result, while
//! any error during evaluation (unparsable address or check field, missing
//! token, transport failure, malformed verdict) rejects the submission
//! outright, even when the checksum matches. Rejection is terminal for the
//! submission; nothing raises past the gate and nothing is retried.

use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::config::{Config, Environment};

/// Verification endpoint for assertion tokens.
const VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Gate decision for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// JSON body returned by the verification service.
#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
}

/// Accept/reject decision for contact-form submissions.
pub struct SpamGate {
    config: Arc<Config>,
    http: reqwest::Client,
    verify_url: String,
}

impl SpamGate {
    pub fn new(config: Arc<Config>, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            verify_url: VERIFY_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_verify_url(config: Arc<Config>, http: reqwest::Client, verify_url: &str) -> Self {
        Self {
            config,
            http,
            verify_url: verify_url.to_string(),
        }
    }

    /// Evaluate one submission. Never fails: every error becomes a reject.
    pub async fn evaluate(
        &self,
        remote_addr: &str,
        check: Option<&str>,
        assertion: Option<&str>,
    ) -> Verdict {
        match self.evaluate_inner(remote_addr, check, assertion).await {
            Ok(true) => Verdict::Accept,
            Ok(false) => {
                tracing::debug!(%remote_addr, "submission rejected: checksum mismatch");
                Verdict::Reject
            }
            Err(err) => {
                tracing::debug!(%remote_addr, error = %err, "submission rejected: gate evaluation failed");
                Verdict::Reject
            }
        }
    }

    async fn evaluate_inner(
        &self,
        remote_addr: &str,
        check: Option<&str>,
        assertion: Option<&str>,
    ) -> anyhow::Result<bool> {
        let checksum_ok = address_checksum(remote_addr)? == parse_check_field(check)?;

        if self.live_verification() {
            let verified = self.verify_assertion(assertion, remote_addr).await?;
            Ok((verified && checksum_ok) || checksum_ok)
        } else {
            Ok(checksum_ok)
        }
    }

    /// Live token verification runs only for a production deployment that
    /// actually sends email.
    fn live_verification(&self) -> bool {
        self.config.email_send && self.config.environment == Environment::Production
    }

    async fn verify_assertion(
        &self,
        assertion: Option<&str>,
        remote_addr: &str,
    ) -> anyhow::Result<bool> {
        let token = assertion.context("missing assertion token")?;

        let params = [
            ("secret", self.config.recaptcha_secret.as_str()),
            ("response", token),
            ("remoteip", remote_addr),
        ];

        let response = self
            .http
            .post(&self.verify_url)
            .form(&params)
            .send()
            .await
            .context("verification request failed")?;

        let verdict: VerifyResponse = response
            .json()
            .await
            .context("malformed verification response")?;

        Ok(verdict.success)
    }
}

/// Sum of the first digit of each dot-separated address segment.
///
/// `"10.0.0.1"` → segments `10,0,0,1` → first characters `1,0,0,1` → 2.
pub fn address_checksum(addr: &str) -> anyhow::Result<i64> {
    addr.split('.')
        .map(|segment| {
            segment
                .chars()
                .next()
                .and_then(|c| c.to_digit(10))
                .map(i64::from)
                .with_context(|| format!("address segment {segment:?} has no leading digit"))
        })
        .sum()
}

fn parse_check_field(check: Option<&str>) -> anyhow::Result<i64> {
    check
        .context("missing check field")?
        .trim()
        .parse::<i64>()
        .context("check field is not an integer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config(environment: Environment, email_send: bool) -> Arc<Config> {
        let mut config = Config::for_tests();
        config.environment = environment;
        config.email_send = email_send;
        Arc::new(config)
    }

    fn gate(environment: Environment, email_send: bool) -> SpamGate {
        SpamGate::new(test_config(environment, email_send), reqwest::Client::new())
    }

    #[test]
    fn checksum_sums_leading_digits() {
        assert_eq!(address_checksum("10.0.0.1").unwrap(), 2);
        assert_eq!(address_checksum("1.2.3.4").unwrap(), 10);
        assert_eq!(address_checksum("192.168.1.77").unwrap(), 11);
    }

    #[test]
    fn checksum_rejects_degenerate_segments() {
        assert!(address_checksum("::1").is_err());
        assert!(address_checksum("10..0.1").is_err());
        assert!(address_checksum("abc.0.0.1").is_err());
    }

    #[tokio::test]
    async fn matching_check_accepts() {
        let gate = gate(Environment::Development, false);
        let verdict = gate.evaluate("10.0.0.1", Some("2"), None).await;
        assert_eq!(verdict, Verdict::Accept);
    }

    #[tokio::test]
    async fn mismatched_check_rejects() {
        let gate = gate(Environment::Development, false);
        let verdict = gate.evaluate("10.0.0.1", Some("3"), None).await;
        assert_eq!(verdict, Verdict::Reject);
    }

    #[tokio::test]
    async fn unparsable_check_rejects() {
        let gate = gate(Environment::Development, false);
        assert_eq!(
            gate.evaluate("10.0.0.1", Some("two"), None).await,
            Verdict::Reject
        );
        assert_eq!(gate.evaluate("10.0.0.1", None, None).await, Verdict::Reject);
    }

    #[tokio::test]
    async fn whitespace_in_check_is_tolerated() {
        let gate = gate(Environment::Development, false);
        assert_eq!(
            gate.evaluate("10.0.0.1", Some(" 2 "), None).await,
            Verdict::Accept
        );
    }

    #[tokio::test]
    async fn verification_is_skipped_outside_production() {
        // No network call happens here: a staging tier with email enabled
        // still takes the checksum-only branch.
        let gate = gate(Environment::Staging, true);
        assert_eq!(
            gate.evaluate("10.0.0.1", Some("2"), None).await,
            Verdict::Accept
        );
    }

    #[tokio::test]
    async fn verification_error_rejects_despite_matching_checksum() {
        // Live verification against an unreachable endpoint: the transport
        // error must reject even though the checksum matches.
        let config = test_config(Environment::Production, true);
        let gate = SpamGate::with_verify_url(
            config,
            reqwest::Client::new(),
            "http://127.0.0.1:9/siteverify",
        );
        assert_eq!(
            gate.evaluate("10.0.0.1", Some("2"), Some("token")).await,
            Verdict::Reject
        );
    }

    #[tokio::test]
    async fn missing_token_rejects_in_production() {
        let config = test_config(Environment::Production, true);
        let gate = SpamGate::new(config, reqwest::Client::new());
        assert_eq!(
            gate.evaluate("10.0.0.1", Some("2"), None).await,
            Verdict::Reject
        );
    }
}
