//! Out-of-band delivery of one-time codes.
//!
//! Delivery runs off the request path on a blocking task. Failures are
//! logged and never reach the OTP state machine.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::db::Account;
use crate::otp::OtpCode;

/// Subject template for code messages.
pub const OTP_SUBJECT: &str = "{site_name} verification code";

/// Body template for code messages.
pub const OTP_BODY: &str = r#"Hello {name},

Your {site_name} verification code is: {code}

The code expires in {minutes} minutes. If you did not request it, you can
ignore this message.

--
{site_name}
"#;

/// Delivery errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The transport refused or failed the message.
    #[error("delivery failed: {0}")]
    Transport(String),
}

/// A rendered code message.
#[derive(Clone)]
pub struct OtpMessage {
    /// Account the code belongs to.
    pub account_id: i64,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body, including the code.
    pub body: String,
}

impl OtpMessage {
    /// Render the message for `account`.
    pub fn render(account: &Account, code: &OtpCode, mail: &MailConfig, expiry_minutes: u64) -> Self {
        let name = if account.full_name().is_empty() {
            account.email.clone()
        } else {
            account.full_name()
        };
        Self {
            account_id: account.id,
            from: mail.from_address.clone(),
            to: account.email.clone(),
            subject: OTP_SUBJECT.replace("{site_name}", &mail.site_name),
            body: OTP_BODY
                .replace("{name}", &name)
                .replace("{site_name}", &mail.site_name)
                .replace("{code}", code.as_str())
                .replace("{minutes}", &expiry_minutes.to_string()),
        }
    }
}

impl fmt::Debug for OtpMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpMessage")
            .field("account_id", &self.account_id)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// A channel that can deliver code messages.
pub trait OtpNotifier: Send + Sync + 'static {
    /// Deliver one message. May block.
    fn deliver(&self, message: &OtpMessage) -> Result<(), NotifyError>;
}

/// Notifier that records deliveries in the log without the code.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl OtpNotifier for LogNotifier {
    fn deliver(&self, message: &OtpMessage) -> Result<(), NotifyError> {
        info!(
            account_id = message.account_id,
            to = %message.to,
            subject = %message.subject,
            "One-time code message queued"
        );
        Ok(())
    }
}

/// Hand `message` to `notifier` on a blocking task and return immediately.
pub(crate) fn dispatch(notifier: &Arc<dyn OtpNotifier>, mail: &MailConfig, message: OtpMessage) {
    if !mail.enabled {
        debug!(account_id = message.account_id, "Mail disabled, code not delivered");
        return;
    }

    let notifier = Arc::clone(notifier);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = notifier.deliver(&message) {
            warn!(
                account_id = message.account_id,
                error = %e,
                "Failed to deliver one-time code"
            );
        }
    });
}
