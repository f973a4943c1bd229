//! Results of OTP operations.

use std::time::Duration;

use thiserror::Error;

use super::OtpCode;

/// Why an OTP check or resend was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// No code was issued, or the cycle was already consumed or cleared.
    #[error("no active one-time code")]
    NoActiveCycle,

    /// The code is past its validity window.
    #[error("one-time code has expired")]
    Expired,

    /// Too many failed checks in this cycle.
    #[error("too many failed attempts")]
    Locked,

    /// The candidate did not match.
    #[error("one-time code does not match")]
    Mismatch,

    /// The cycle was already verified; nothing to resend.
    #[error("one-time code already verified")]
    AlreadyVerified,

    /// The resend cooldown has not elapsed.
    #[error("resend available in {}s", retry_after.as_secs())]
    ResendTooSoon {
        /// Time until a resend is allowed.
        retry_after: Duration,
    },

    /// The resend ceiling was reached and the lockout window is still open.
    #[error("resend limit reached, retry in {}s", retry_after.as_secs())]
    ResendCeilingReached {
        /// Time until the cycle is cleared.
        retry_after: Duration,
    },
}

/// Outcome of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The code matched and the cycle was consumed.
    Verified,
    /// The cycle was already verified; no attempt was counted.
    AlreadyVerified,
    /// The check failed.
    Rejected(OtpError),
}

impl VerifyOutcome {
    /// Collapsed boolean view.
    pub fn is_success(&self) -> bool {
        matches!(self, VerifyOutcome::Verified | VerifyOutcome::AlreadyVerified)
    }

    /// The failure reason, if any.
    pub fn rejection(&self) -> Option<&OtpError> {
        match self {
            VerifyOutcome::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Whether a resend may happen now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendDecision {
    /// A resend is allowed.
    Allowed,
    /// A resend is refused.
    Denied(OtpError),
}

impl ResendDecision {
    /// Check if the resend is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, ResendDecision::Allowed)
    }
}

/// Outcome of a fused resend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendOutcome {
    /// A new code was issued and must be delivered.
    Sent(OtpCode),
    /// The resend was refused.
    Denied(OtpError),
}

impl ResendOutcome {
    /// Check if a code was sent.
    pub fn is_sent(&self) -> bool {
        matches!(self, ResendOutcome::Sent(_))
    }
}
