//! Limits and windows that drive the OTP state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::OtpConfig;

/// OTP limits and time windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    /// How long a code stays valid after issuance.
    pub expiry: Duration,
    /// Failed checks allowed before the cycle locks.
    pub max_attempts: u32,
    /// Wait after issuance before a resend is allowed.
    pub resend_cooldown: Duration,
    /// Resends allowed before the lockout window applies.
    pub max_resends: u32,
    /// Age at which an exhausted cycle is cleared.
    pub resend_lockout: Duration,
    /// Keep a verified cycle until the next issuance instead of clearing it.
    pub retain_verified: bool,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(600),
            max_attempts: 5,
            resend_cooldown: Duration::from_secs(60),
            max_resends: 5,
            resend_lockout: Duration::from_secs(1800),
            retain_verified: false,
        }
    }
}

impl From<&OtpConfig> for OtpPolicy {
    fn from(config: &OtpConfig) -> Self {
        Self {
            expiry: Duration::from_secs(config.expiry_secs),
            max_attempts: config.max_attempts,
            resend_cooldown: Duration::from_secs(config.resend_cooldown_secs),
            max_resends: config.max_resends,
            resend_lockout: Duration::from_secs(config.resend_lockout_secs),
            retain_verified: config.retain_verified,
        }
    }
}

impl OtpPolicy {
    /// Set the verified-cycle retention mode.
    pub fn with_retain_verified(mut self, retain: bool) -> Self {
        self.retain_verified = retain;
        self
    }
}

/// End of a window that opened at `start`, or `None` if it is unrepresentable.
pub(crate) fn deadline(start: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| start.checked_add_signed(w))
}

/// True once `now` is strictly past the end of the window.
pub(crate) fn has_elapsed(start: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    deadline(start, window).is_some_and(|end| now > end)
}

/// Time left until the window closes (zero when already past).
pub(crate) fn remaining(start: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> Duration {
    deadline(start, window)
        .and_then(|end| (end - now).to_std().ok())
        .unwrap_or(Duration::ZERO)
}
