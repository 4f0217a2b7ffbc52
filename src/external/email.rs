//! Email collaborator seam.
//!
//! The core only depends on `send(to, subject, html)`; notification-style
//! call sites (budget alerts, invitations) treat failure as best-effort and
//! never propagate it.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::config;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

/// Development mailer: records the send in the log and succeeds. The real
/// SMTP client lives outside this repository.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), MailError> {
        tracing::info!(
            "mail from={} to={} subject={:?}",
            config::config().mail.from_address,
            to,
            subject
        );
        Ok(())
    }
}

static MAILER: Lazy<Box<dyn Mailer>> = Lazy::new(|| Box::new(LogMailer));

pub fn mailer() -> &'static dyn Mailer {
    MAILER.as_ref()
}
