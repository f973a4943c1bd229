//! Persistence-backed OTP lifecycle manager.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::code::{generate_code, OtpCode};
use super::cycle::{check_resend, OtpCycle, OtpSummary, Precheck};
use super::hasher::{CodeHasher, HashError};
use super::outcome::{OtpError, ResendDecision, ResendOutcome, VerifyOutcome};
use super::OtpPolicy;
use crate::db::{Database, OtpRepository};
use crate::Result;

/// Issues, verifies and throttles one-time codes for accounts.
///
/// Cheap to clone; clones share the database pool and clock.
#[derive(Clone)]
pub struct OtpManager {
    db: Arc<Database>,
    policy: OtpPolicy,
    hasher: CodeHasher,
    clock: Arc<dyn Clock>,
}

impl OtpManager {
    /// Create a manager using the system clock.
    pub fn new(db: Arc<Database>, policy: OtpPolicy, hasher: CodeHasher) -> Self {
        Self {
            db,
            policy,
            hasher,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The active policy.
    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    fn repo(&self) -> OtpRepository<'_> {
        OtpRepository::new(self.db.pool())
    }

    /// Stored timestamps keep microseconds, so decisions use the same precision.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    /// The account's current cycle, if any.
    pub async fn state(&self, account_id: i64) -> Result<Option<OtpCycle>> {
        self.repo().load(account_id).await
    }

    /// Start a new cycle and return the plaintext code.
    ///
    /// Any previous cycle for the account is discarded.
    pub async fn generate(&self, account_id: i64) -> Result<OtpCode> {
        let code = generate_code();
        let hash = self.hasher.hash(code.as_str())?;
        let cycle = OtpCycle::issue(hash, self.now());
        self.repo().store(account_id, &cycle).await?;

        info!(account_id, "Issued one-time code");
        Ok(code)
    }

    /// Check a candidate code.
    pub async fn verify(&self, account_id: i64, candidate: &str) -> Result<VerifyOutcome> {
        let repo = self.repo();
        let now = self.now();

        let Some(cycle) = repo.load(account_id).await? else {
            return Ok(self.rejected(account_id, OtpError::NoActiveCycle));
        };

        match cycle.precheck(&self.policy, now) {
            Err(reason) => return Ok(self.rejected(account_id, reason)),
            Ok(Precheck::AlreadyVerified) => {
                debug!(account_id, "One-time code already verified");
                return Ok(VerifyOutcome::AlreadyVerified);
            }
            Ok(Precheck::Compare) => {}
        }

        let matched = match self.hasher.verify(candidate, &cycle.secret_hash) {
            Ok(matched) => matched,
            Err(HashError::InvalidHash) => {
                warn!(account_id, "Stored OTP hash is malformed, treating as no active cycle");
                return Ok(self.rejected(account_id, OtpError::NoActiveCycle));
            }
            Err(e) => return Err(e.into()),
        };

        let max_attempts = self.policy.max_attempts;
        if matched {
            let applied = if self.policy.retain_verified {
                repo.mark_verified(account_id, &cycle.created_at, max_attempts)
                    .await?
            } else {
                repo.consume(account_id, &cycle.created_at, max_attempts)
                    .await?
            };
            if !applied {
                return Ok(self.lost_race(account_id, &cycle).await?);
            }
            info!(account_id, "One-time code verified");
            return Ok(VerifyOutcome::Verified);
        }

        match repo
            .record_failed_attempt(account_id, &cycle.created_at, max_attempts)
            .await?
        {
            Some(attempts) => {
                debug!(account_id, attempts, "One-time code mismatch");
                Ok(self.rejected(account_id, OtpError::Mismatch))
            }
            None => self.lost_race(account_id, &cycle).await,
        }
    }

    /// Work out why a conditional update on `seen` affected nothing.
    async fn lost_race(&self, account_id: i64, seen: &OtpCycle) -> Result<VerifyOutcome> {
        let current = self.repo().load(account_id).await?;
        let reason = match current {
            Some(c) if c.created_at == seen.created_at && c.verified => {
                return Ok(VerifyOutcome::AlreadyVerified);
            }
            Some(c) if c.created_at == seen.created_at => OtpError::Locked,
            _ => OtpError::NoActiveCycle,
        };
        Ok(self.rejected(account_id, reason))
    }

    fn rejected(&self, account_id: i64, reason: OtpError) -> VerifyOutcome {
        info!(account_id, reason = %reason, "One-time code rejected");
        VerifyOutcome::Rejected(reason)
    }

    /// Clear the cycle if it exhausted its resends and aged past the lockout.
    ///
    /// Returns true if a cycle was cleared.
    pub async fn reap_if_expired(&self, account_id: i64) -> Result<bool> {
        let repo = self.repo();
        let Some(cycle) = repo.load(account_id).await? else {
            return Ok(false);
        };
        if !cycle.is_reapable(&self.policy, self.now()) {
            return Ok(false);
        }

        let cleared = repo.delete_if_current(account_id, &cycle.created_at).await?;
        if cleared {
            info!(account_id, "Cleared exhausted OTP cycle");
        }
        Ok(cleared)
    }

    /// Decide whether a resend is allowed now.
    ///
    /// Runs [`Self::reap_if_expired`] first, so an exhausted cycle past the
    /// lockout is cleared as part of the check.
    pub async fn can_resend(&self, account_id: i64) -> Result<ResendDecision> {
        self.reap_if_expired(account_id).await?;
        let cycle = self.repo().load(account_id).await?;
        Ok(check_resend(cycle.as_ref(), &self.policy, self.now()))
    }

    /// Count one resend on the active cycle.
    ///
    /// Does not check [`Self::can_resend`]. Returns false with no change when
    /// there is no active cycle.
    pub async fn record_resend(&self, account_id: i64) -> Result<bool> {
        let repo = self.repo();
        let Some(cycle) = repo.load(account_id).await? else {
            return Ok(false);
        };
        let recorded = repo.increment_resend(account_id, &cycle.created_at).await?;
        if recorded {
            debug!(account_id, "Recorded OTP resend");
        }
        Ok(recorded)
    }

    /// Check, record and reissue in one step.
    ///
    /// Without an active cycle a fresh one is started. Otherwise the code is
    /// replaced: the validity window and attempt counter restart while the
    /// resend counter grows by one.
    pub async fn resend(&self, account_id: i64) -> Result<ResendOutcome> {
        self.reap_if_expired(account_id).await?;

        // Decide and swap against the same snapshot.
        let repo = self.repo();
        let cycle = repo.load(account_id).await?;
        let now = self.now();
        if let ResendDecision::Denied(reason) = check_resend(cycle.as_ref(), &self.policy, now) {
            info!(account_id, reason = %reason, "OTP resend denied");
            return Ok(ResendOutcome::Denied(reason));
        }

        let code = generate_code();
        let hash = self.hasher.hash(code.as_str())?;

        let Some(cycle) = cycle else {
            let fresh = OtpCycle::issue(hash, now);
            if !repo.insert_if_absent(account_id, &fresh).await? {
                if repo.load(account_id).await?.is_some() {
                    // A concurrent request started the cycle first.
                    return Ok(ResendOutcome::Denied(OtpError::ResendTooSoon {
                        retry_after: self.policy.resend_cooldown,
                    }));
                }
                // The existing row is undecodable; replace it.
                repo.store(account_id, &fresh).await?;
            }
            info!(account_id, "Issued one-time code");
            return Ok(ResendOutcome::Sent(code));
        };

        if !repo
            .replace_code(account_id, &cycle.created_at, &hash, &now)
            .await?
        {
            // Another request replaced the cycle between the check and the update.
            return Ok(ResendOutcome::Denied(OtpError::ResendTooSoon {
                retry_after: self.policy.resend_cooldown,
            }));
        }

        info!(
            account_id,
            resend_count = cycle.resend_count + 1,
            "Reissued one-time code"
        );
        Ok(ResendOutcome::Sent(code))
    }

    /// Admin snapshot of the account's cycle.
    pub async fn summary(&self, account_id: i64) -> Result<Option<OtpSummary>> {
        let cycle = self.repo().load(account_id).await?;
        Ok(cycle.map(|c| c.summary(&self.policy)))
    }

    /// Drop the account's cycle unconditionally.
    pub async fn clear(&self, account_id: i64) -> Result<bool> {
        self.repo().delete(account_id).await
    }
}
