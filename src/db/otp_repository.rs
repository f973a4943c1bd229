//! OTP cycle repository.
//!
//! One row per account in `otp_cycles`; a missing row means no active
//! cycle. Updates that race with other requests for the same account are
//! conditional on the cycle's issuance time, so a verify or resend that
//! lost the race affects no rows instead of overwriting a newer cycle.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use super::DbPool;
use crate::otp::{CodeHasher, LegacyOtpMetadata, OtpCycle};
use crate::Result;

/// Raw row, decoded leniently so corrupt data can be reported rather than
/// failing the query.
#[derive(Debug, sqlx::FromRow)]
struct OtpCycleRow {
    secret_hash: String,
    created_at: String,
    verification_attempts: i64,
    resend_count: i64,
    verified: bool,
}

impl OtpCycleRow {
    fn into_cycle(self) -> Option<OtpCycle> {
        let created_at = decode_time(&self.created_at)?;
        Some(OtpCycle {
            secret_hash: self.secret_hash,
            created_at,
            verification_attempts: u32::try_from(self.verification_attempts).ok()?,
            resend_count: u32::try_from(self.resend_count).ok()?,
            verified: self.verified,
        })
    }
}

fn encode_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Repository for OTP cycles.
pub struct OtpRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> OtpRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Load the cycle for an account.
    ///
    /// A row that cannot be decoded is logged and reported as no cycle.
    pub async fn load(&self, account_id: i64) -> Result<Option<OtpCycle>> {
        let row = sqlx::query_as::<_, OtpCycleRow>(
            "SELECT secret_hash, created_at, verification_attempts, resend_count, verified
             FROM otp_cycles WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cycle = row.into_cycle();
        if cycle.is_none() {
            warn!(account_id, "Malformed OTP cycle row, treating as no active cycle");
        }
        Ok(cycle)
    }

    /// Insert a cycle only if the account has none.
    ///
    /// Returns false, leaving the existing row alone, when one is present.
    pub async fn insert_if_absent(&self, account_id: i64, cycle: &OtpCycle) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO otp_cycles
                 (account_id, secret_hash, created_at, verification_attempts, resend_count, verified)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(account_id) DO NOTHING",
        )
        .bind(account_id)
        .bind(&cycle.secret_hash)
        .bind(encode_time(&cycle.created_at))
        .bind(i64::from(cycle.verification_attempts))
        .bind(i64::from(cycle.resend_count))
        .bind(cycle.verified)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or replace the cycle for an account.
    pub async fn store(&self, account_id: i64, cycle: &OtpCycle) -> Result<()> {
        sqlx::query(
            "INSERT INTO otp_cycles
                 (account_id, secret_hash, created_at, verification_attempts, resend_count, verified)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(account_id) DO UPDATE SET
                 secret_hash = excluded.secret_hash,
                 created_at = excluded.created_at,
                 verification_attempts = excluded.verification_attempts,
                 resend_count = excluded.resend_count,
                 verified = excluded.verified",
        )
        .bind(account_id)
        .bind(&cycle.secret_hash)
        .bind(encode_time(&cycle.created_at))
        .bind(i64::from(cycle.verification_attempts))
        .bind(i64::from(cycle.resend_count))
        .bind(cycle.verified)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Remove the cycle for an account, whatever it is.
    pub async fn delete(&self, account_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM otp_cycles WHERE account_id = ?")
            .bind(account_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove the cycle only if it is still the one issued at `created_at`.
    pub async fn delete_if_current(&self, account_id: i64, created_at: &DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("DELETE FROM otp_cycles WHERE account_id = ? AND created_at = ?")
            .bind(account_id)
            .bind(encode_time(created_at))
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Consume a matched cycle: delete it if it is still current, unverified
    /// and below the attempt ceiling.
    pub async fn consume(
        &self,
        account_id: i64,
        created_at: &DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM otp_cycles
             WHERE account_id = ? AND created_at = ?
               AND verification_attempts < ? AND verified = 0",
        )
        .bind(account_id)
        .bind(encode_time(created_at))
        .bind(i64::from(max_attempts))
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flag a matched cycle as verified, under the same conditions as
    /// [`Self::consume`].
    pub async fn mark_verified(
        &self,
        account_id: i64,
        created_at: &DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE otp_cycles SET verified = 1
             WHERE account_id = ? AND created_at = ?
               AND verification_attempts < ? AND verified = 0",
        )
        .bind(account_id)
        .bind(encode_time(created_at))
        .bind(i64::from(max_attempts))
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a failed check on the current cycle.
    ///
    /// Returns the new attempt count, or `None` if the cycle changed, was
    /// verified, or already reached the ceiling.
    pub async fn record_failed_attempt(
        &self,
        account_id: i64,
        created_at: &DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Option<u32>> {
        let attempts: Option<i64> = sqlx::query_scalar(
            "UPDATE otp_cycles SET verification_attempts = verification_attempts + 1
             WHERE account_id = ? AND created_at = ?
               AND verification_attempts < ? AND verified = 0
             RETURNING verification_attempts",
        )
        .bind(account_id)
        .bind(encode_time(created_at))
        .bind(i64::from(max_attempts))
        .fetch_optional(self.pool)
        .await?;
        Ok(attempts.and_then(|n| u32::try_from(n).ok()))
    }

    /// Count one resend on the cycle issued at `created_at`.
    ///
    /// Returns false when that cycle is no longer current.
    pub async fn increment_resend(&self, account_id: i64, created_at: &DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE otp_cycles SET resend_count = resend_count + 1
             WHERE account_id = ? AND created_at = ?",
        )
        .bind(account_id)
        .bind(encode_time(created_at))
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the code of the cycle issued at `previous` (see
    /// [`OtpCycle::reissue`]).
    pub async fn replace_code(
        &self,
        account_id: i64,
        previous: &DateTime<Utc>,
        secret_hash: &str,
        now: &DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE otp_cycles
             SET secret_hash = ?, created_at = ?, verification_attempts = 0,
                 verified = 0, resend_count = resend_count + 1
             WHERE account_id = ? AND created_at = ?",
        )
        .bind(secret_hash)
        .bind(encode_time(now))
        .bind(account_id)
        .bind(encode_time(previous))
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Import a cycle kept in the legacy `(otp hash, metadata string,
    /// verified flag)` layout.
    ///
    /// Both strings present and well-formed replaces the account's cycle;
    /// anything else clears it. Only Argon2 PHC hashes are accepted, since no
    /// other format can be verified later.
    pub async fn import_legacy(
        &self,
        account_id: i64,
        otp_hash: Option<&str>,
        metadata: Option<&str>,
        verified: bool,
    ) -> Result<Option<OtpCycle>> {
        let (Some(otp_hash), Some(metadata)) = (otp_hash, metadata) else {
            self.delete(account_id).await?;
            return Ok(None);
        };

        if !CodeHasher::is_supported(otp_hash) {
            warn!(account_id, "Legacy OTP hash is not an Argon2 PHC string, clearing cycle");
            self.delete(account_id).await?;
            return Ok(None);
        }

        match LegacyOtpMetadata::parse(metadata) {
            Ok(parsed) => {
                let cycle = parsed.into_cycle(otp_hash, verified);
                self.store(account_id, &cycle).await?;
                Ok(Some(cycle))
            }
            Err(e) => {
                warn!(account_id, error = %e, "Malformed legacy OTP metadata, clearing cycle");
                self.delete(account_id).await?;
                Ok(None)
            }
        }
    }

    /// Export the account's cycle as `(otp hash, metadata string)`.
    pub async fn export_legacy(&self, account_id: i64) -> Result<Option<(String, String)>> {
        let cycle = self.load(account_id).await?;
        Ok(cycle.map(|c| {
            let metadata = LegacyOtpMetadata::from_cycle(&c).to_string();
            (c.secret_hash, metadata)
        }))
    }
}
