//! The per-account OTP cycle and its transitions.
//!
//! Everything here is pure: callers pass the current time and the policy,
//! and persistence is left to [`super::OtpManager`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::outcome::{OtpError, ResendDecision};
use super::policy::{has_elapsed, remaining};
use super::OtpPolicy;

/// One issued code and its counters.
///
/// The hash and the issuance time always travel together; "no cycle" is
/// `Option::<OtpCycle>::None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCycle {
    /// Salted hash of the current code (PHC string).
    pub secret_hash: String,
    /// When the current code was issued.
    pub created_at: DateTime<Utc>,
    /// Failed checks since issuance.
    pub verification_attempts: u32,
    /// Resends since the cycle started.
    pub resend_count: u32,
    /// The code was checked successfully and the cycle was retained.
    pub verified: bool,
}

/// Result of the checks that run before a hash comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precheck {
    /// Compare the candidate against the stored hash.
    Compare,
    /// Already verified; succeed without counting an attempt.
    AlreadyVerified,
}

impl OtpCycle {
    /// Start a new cycle for a freshly hashed code.
    pub fn issue(secret_hash: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            secret_hash: secret_hash.into(),
            created_at: now,
            verification_attempts: 0,
            resend_count: 0,
            verified: false,
        }
    }

    /// Check if the attempt ceiling was reached.
    pub fn is_locked(&self, policy: &OtpPolicy) -> bool {
        self.verification_attempts >= policy.max_attempts
    }

    /// Check if the code is past its validity window.
    pub fn is_expired(&self, policy: &OtpPolicy, now: DateTime<Utc>) -> bool {
        has_elapsed(self.created_at, policy.expiry, now)
    }

    /// Run the short-circuit checks of a verification, in order:
    /// lockout, expiry, then the verified flag.
    pub fn precheck(&self, policy: &OtpPolicy, now: DateTime<Utc>) -> Result<Precheck, OtpError> {
        if self.is_locked(policy) {
            return Err(OtpError::Locked);
        }
        if self.is_expired(policy, now) {
            return Err(OtpError::Expired);
        }
        if self.verified {
            return Ok(Precheck::AlreadyVerified);
        }
        Ok(Precheck::Compare)
    }

    /// Check if the cycle exhausted its resends and aged past the lockout,
    /// which means it should be cleared.
    pub fn is_reapable(&self, policy: &OtpPolicy, now: DateTime<Utc>) -> bool {
        !self.verified
            && self.resend_count >= policy.max_resends
            && has_elapsed(self.created_at, policy.resend_lockout, now)
    }

    /// Count one failed check.
    pub fn record_failure(&mut self) {
        self.verification_attempts = self.verification_attempts.saturating_add(1);
    }

    /// Count one resend.
    pub fn record_resend(&mut self) {
        self.resend_count = self.resend_count.saturating_add(1);
    }

    /// Swap in a new code for a resend: the validity window and attempt
    /// counter restart, the resend counter carries over and grows by one.
    pub fn reissue(&mut self, secret_hash: impl Into<String>, now: DateTime<Utc>) {
        self.secret_hash = secret_hash.into();
        self.created_at = now;
        self.verification_attempts = 0;
        self.verified = false;
        self.record_resend();
    }

    /// Admin view of this cycle.
    pub fn summary(&self, policy: &OtpPolicy) -> OtpSummary {
        OtpSummary {
            created_at: self.created_at,
            attempts_left: policy.max_attempts.saturating_sub(self.verification_attempts),
            resends_left: policy.max_resends.saturating_sub(self.resend_count),
            verified: self.verified,
        }
    }
}

/// Decide whether a resend is allowed.
///
/// Pure: an exhausted cycle past the lockout window reports `Allowed`, and
/// clearing it is left to the caller (see [`OtpCycle::is_reapable`]).
pub fn check_resend(
    cycle: Option<&OtpCycle>,
    policy: &OtpPolicy,
    now: DateTime<Utc>,
) -> ResendDecision {
    let Some(cycle) = cycle else {
        return ResendDecision::Allowed;
    };

    if cycle.verified {
        return ResendDecision::Denied(OtpError::AlreadyVerified);
    }

    if cycle.resend_count >= policy.max_resends {
        if has_elapsed(cycle.created_at, policy.resend_lockout, now) {
            return ResendDecision::Allowed;
        }
        return ResendDecision::Denied(OtpError::ResendCeilingReached {
            retry_after: remaining(cycle.created_at, policy.resend_lockout, now),
        });
    }

    if has_elapsed(cycle.created_at, policy.resend_cooldown, now) {
        ResendDecision::Allowed
    } else {
        ResendDecision::Denied(OtpError::ResendTooSoon {
            retry_after: remaining(cycle.created_at, policy.resend_cooldown, now),
        })
    }
}

/// Read-only snapshot of a cycle for account administration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtpSummary {
    /// When the current code was issued.
    pub created_at: DateTime<Utc>,
    /// Failed checks left before lockout.
    pub attempts_left: u32,
    /// Resends left before the lockout window applies.
    pub resends_left: u32,
    /// Whether the cycle is verified and retained.
    pub verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn cycle_at(secs: i64) -> OtpCycle {
        OtpCycle::issue("$argon2id$stub", at(secs))
    }

    #[test]
    fn test_issue_resets_counters() {
        let cycle = cycle_at(1_000);
        assert_eq!(cycle.verification_attempts, 0);
        assert_eq!(cycle.resend_count, 0);
        assert!(!cycle.verified);
        assert_eq!(cycle.created_at, at(1_000));
    }

    #[test]
    fn test_precheck_fresh_cycle_compares() {
        let policy = OtpPolicy::default();
        assert_eq!(cycle_at(1_000).precheck(&policy, at(1_001)), Ok(Precheck::Compare));
    }

    #[test]
    fn test_precheck_expiry_boundary() {
        let policy = OtpPolicy::default();
        let cycle = cycle_at(1_000);
        assert_eq!(cycle.precheck(&policy, at(1_600)), Ok(Precheck::Compare));
        assert_eq!(cycle.precheck(&policy, at(1_601)), Err(OtpError::Expired));
    }

    #[test]
    fn test_precheck_lock_wins_over_expiry() {
        let policy = OtpPolicy::default();
        let mut cycle = cycle_at(1_000);
        for _ in 0..5 {
            cycle.record_failure();
        }
        assert_eq!(cycle.precheck(&policy, at(1_001)), Err(OtpError::Locked));
        assert_eq!(cycle.precheck(&policy, at(9_999)), Err(OtpError::Locked));
    }

    #[test]
    fn test_precheck_verified_after_lock_and_expiry() {
        let policy = OtpPolicy::default();
        let mut cycle = cycle_at(1_000);
        cycle.verified = true;

        assert_eq!(cycle.precheck(&policy, at(1_100)), Ok(Precheck::AlreadyVerified));
        assert_eq!(cycle.precheck(&policy, at(1_601)), Err(OtpError::Expired));
    }

    #[test]
    fn test_resend_without_cycle_allowed() {
        assert!(check_resend(None, &OtpPolicy::default(), at(0)).is_allowed());
    }

    #[test]
    fn test_resend_cooldown() {
        let policy = OtpPolicy::default();
        let cycle = cycle_at(1_000);

        assert_eq!(
            check_resend(Some(&cycle), &policy, at(1_000)),
            ResendDecision::Denied(OtpError::ResendTooSoon {
                retry_after: Duration::from_secs(60)
            })
        );
        assert!(!check_resend(Some(&cycle), &policy, at(1_060)).is_allowed());
        assert!(check_resend(Some(&cycle), &policy, at(1_061)).is_allowed());
    }

    #[test]
    fn test_resend_denied_when_verified() {
        let policy = OtpPolicy::default();
        let mut cycle = cycle_at(1_000);
        cycle.verified = true;

        assert_eq!(
            check_resend(Some(&cycle), &policy, at(5_000)),
            ResendDecision::Denied(OtpError::AlreadyVerified)
        );
    }

    #[test]
    fn test_resend_ceiling_and_lockout() {
        let policy = OtpPolicy::default();
        let mut cycle = cycle_at(1_000);
        for _ in 0..5 {
            cycle.record_resend();
        }

        assert_eq!(
            check_resend(Some(&cycle), &policy, at(2_799)),
            ResendDecision::Denied(OtpError::ResendCeilingReached {
                retry_after: Duration::from_secs(1)
            })
        );
        assert!(!cycle.is_reapable(&policy, at(2_799)));

        assert!(check_resend(Some(&cycle), &policy, at(2_801)).is_allowed());
        assert!(cycle.is_reapable(&policy, at(2_801)));
    }

    #[test]
    fn test_not_reapable_below_ceiling() {
        let policy = OtpPolicy::default();
        let mut cycle = cycle_at(1_000);
        cycle.record_resend();
        assert!(!cycle.is_reapable(&policy, at(100_000)));
    }

    #[test]
    fn test_reissue_keeps_resend_count() {
        let mut cycle = cycle_at(1_000);
        cycle.record_failure();
        cycle.record_failure();
        cycle.reissue("$argon2id$other", at(1_100));

        assert_eq!(cycle.secret_hash, "$argon2id$other");
        assert_eq!(cycle.created_at, at(1_100));
        assert_eq!(cycle.verification_attempts, 0);
        assert_eq!(cycle.resend_count, 1);
    }

    #[test]
    fn test_summary() {
        let policy = OtpPolicy::default();
        let mut cycle = cycle_at(1_000);
        cycle.record_failure();
        cycle.record_resend();
        cycle.record_resend();

        let summary = cycle.summary(&policy);
        assert_eq!(summary.created_at, at(1_000));
        assert_eq!(summary.attempts_left, 4);
        assert_eq!(summary.resends_left, 3);
        assert!(!summary.verified);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = cycle_at(0).summary(&OtpPolicy::default());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["attempts_left"], 5);
        assert_eq!(json["resends_left"], 5);
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
    }
}
