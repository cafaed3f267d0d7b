//! Emailing the run summary.
//!
//! Reporting is strictly best-effort: the orchestrator logs transport
//! failures and carries on, so nothing here is allowed to abort a run.

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;

use crate::config::ReportConfig;
use crate::run::RunSummary;

/// Subject line used for every summary email.
pub const REPORT_SUBJECT: &str = "backup report";

/// Errors raised while building or sending the report email.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A configured address failed to parse.
    #[error("invalid {field} address: {source}")]
    Address {
        /// Which config field held the bad address.
        field: &'static str,
        /// Parser error.
        #[source]
        source: lettre::address::AddressError,
    },
    /// The message could not be assembled.
    #[error("failed to build report message: {0}")]
    Message(#[from] lettre::error::Error),
    /// The SMTP relay rejected or never received the message.
    #[error("smtp delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Sends a formatted summary somewhere an operator will see it.
pub trait Reporter {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the message cannot be built or sent.
    fn send(&self, subject: &str, body: &str) -> Result<(), ReportError>;
}

/// Reporter that relays plain-text mail through an SMTP server.
#[derive(Clone, Debug)]
pub struct SmtpReporter {
    config: ReportConfig,
}

impl SmtpReporter {
    /// Wires a reporter to the configured relay.
    #[must_use]
    pub const fn new(config: ReportConfig) -> Self {
        Self { config }
    }
}

impl Reporter for SmtpReporter {
    fn send(&self, subject: &str, body: &str) -> Result<(), ReportError> {
        let from: Mailbox =
            self.config
                .mail_from
                .parse()
                .map_err(|source| ReportError::Address {
                    field: "mail_from",
                    source,
                })?;
        let to: Mailbox = self
            .config
            .mail_to
            .parse()
            .map_err(|source| ReportError::Address {
                field: "mail_to",
                source,
            })?;
        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())?;

        // Plain relay on the standard port; the report carries no secrets.
        let mailer = SmtpTransport::builder_dangerous(self.config.smtp_server.as_str()).build();
        mailer.send(&email)?;
        tracing::info!(to = %self.config.mail_to, "report sent");
        Ok(())
    }
}

/// Renders the summary body. Failure lines are omitted when their count is
/// zero so the common all-green report stays short.
#[must_use]
pub fn format_report(summary: &RunSummary) -> String {
    let mut body = format!(
        "backups created: {}\nbackups deleted: {}\n",
        summary.created, summary.deleted
    );
    if summary.failed != 0 {
        body.push_str(&format!("backups failed: {}\n", summary.failed));
    }
    if summary.delete_failed != 0 {
        body.push_str(&format!("deletions failed: {}\n", summary.delete_failed));
    }
    body
}
