//! Outbound email capability and the link/message builders used by the
//! join and recovery flows.
//!
//! Delivery is best effort: a failed send is logged and never changes
//! the outcome of the workflow that triggered it.

use std::future::Future;

use tracing::{info, warn};

/// A message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// No transport configured; nothing was attempted.
    Skipped,
    Failed(String),
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: OutboundEmail) -> impl Future<Output = SendOutcome> + Send;
}

/// Mailer used when no transport is configured. Logs the recipient and
/// subject and reports [`SendOutcome::Skipped`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> SendOutcome {
        info!(to = %email.to, subject = %email.subject, "email transport not configured, skipping send");
        SendOutcome::Skipped
    }
}

/// Send and log the result. Never fails.
pub(crate) async fn deliver<M: Mailer>(mailer: &M, email: OutboundEmail) -> SendOutcome {
    let to = email.to.clone();
    let outcome = mailer.send(email).await;
    if let SendOutcome::Failed(reason) = &outcome {
        warn!(%to, %reason, "email delivery failed");
    }
    outcome
}

/// Builds the public URLs embedded in emails and invite responses.
#[derive(Debug, Clone)]
pub struct Links {
    base_url: String,
}

impl Links {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn verify_email(&self, token: &str) -> String {
        format!("{}/verify-email?token={token}", self.base_url)
    }

    pub fn reset_password(&self, token: &str) -> String {
        format!("{}/reset-password?token={token}", self.base_url)
    }

    pub fn join(&self, tenant_slug: &str, code: &str) -> String {
        format!("{}/join/{tenant_slug}?code={code}", self.base_url)
    }
}

pub(crate) fn verification_email(to: &str, link: &str) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Verify your email address".into(),
        text: format!("Confirm your email address by opening this link:\n\n{link}\n"),
        html: Some(format!(
            "<p>Confirm your email address by opening this link:</p><p><a href=\"{link}\">{link}</a></p>"
        )),
    }
}

pub(crate) fn password_reset_email(to: &str, link: &str) -> OutboundEmail {
    OutboundEmail {
        to: to.to_string(),
        subject: "Reset your password".into(),
        text: format!(
            "A password reset was requested for your account. \
             If this was you, open this link:\n\n{link}\n\n\
             Otherwise you can ignore this message."
        ),
        html: Some(format!(
            "<p>A password reset was requested for your account. If this was you, open this link:</p>\
             <p><a href=\"{link}\">{link}</a></p><p>Otherwise you can ignore this message.</p>"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_strip_trailing_slash() {
        let links = Links::new("https://app.example.com/");
        assert_eq!(
            links.verify_email("abc"),
            "https://app.example.com/verify-email?token=abc"
        );
        assert_eq!(
            links.reset_password("abc"),
            "https://app.example.com/reset-password?token=abc"
        );
        assert_eq!(
            links.join("acme", "xyz"),
            "https://app.example.com/join/acme?code=xyz"
        );
    }

    #[test]
    fn emails_embed_the_link() {
        let email = verification_email("bob@x.com", "https://l/verify-email?token=t");
        assert_eq!(email.to, "bob@x.com");
        assert!(email.text.contains("https://l/verify-email?token=t"));
        assert!(password_reset_email("a@b.c", "L").text.contains('L'));
    }
}
