//! Legacy `created_at:attempts:resends` metadata string.
//!
//! Older account records kept the cycle counters in a single text column,
//! e.g. `1700000000.123456:2:1`. This codec reads and writes that format
//! so such records can be imported into, and exported from, the structured
//! `otp_cycles` table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::OtpCycle;

/// Legacy metadata parse errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// Not exactly three colon-separated fields.
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),

    /// The timestamp field is not a usable epoch value.
    #[error("invalid timestamp: {0}")]
    Timestamp(String),

    /// A counter field is not a non-negative integer.
    #[error("invalid counter: {0}")]
    Counter(String),
}

/// Decoded legacy metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyOtpMetadata {
    /// Issuance time.
    pub created_at: DateTime<Utc>,
    /// Failed checks.
    pub verification_attempts: u32,
    /// Resends.
    pub resend_count: u32,
}

impl LegacyOtpMetadata {
    /// Parse `created_at_epoch_seconds:attempts:resends`.
    ///
    /// The timestamp may carry a fractional part (microsecond precision).
    pub fn parse(s: &str) -> Result<Self, MetadataError> {
        let fields: Vec<&str> = s.trim().split(':').collect();
        if fields.len() != 3 {
            return Err(MetadataError::FieldCount(fields.len()));
        }

        let secs: f64 = fields[0]
            .parse()
            .map_err(|_| MetadataError::Timestamp(fields[0].to_string()))?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(MetadataError::Timestamp(fields[0].to_string()));
        }
        let created_at = DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
            .ok_or_else(|| MetadataError::Timestamp(fields[0].to_string()))?;

        let counter = |field: &str| {
            field
                .parse::<u32>()
                .map_err(|_| MetadataError::Counter(field.to_string()))
        };

        Ok(Self {
            created_at,
            verification_attempts: counter(fields[1])?,
            resend_count: counter(fields[2])?,
        })
    }

    /// Take the counters of a structured cycle.
    pub fn from_cycle(cycle: &OtpCycle) -> Self {
        Self {
            created_at: cycle.created_at,
            verification_attempts: cycle.verification_attempts,
            resend_count: cycle.resend_count,
        }
    }

    /// Rebuild a structured cycle around a stored hash.
    pub fn into_cycle(self, secret_hash: impl Into<String>, verified: bool) -> OtpCycle {
        OtpCycle {
            secret_hash: secret_hash.into(),
            created_at: self.created_at,
            verification_attempts: self.verification_attempts,
            resend_count: self.resend_count,
            verified,
        }
    }
}

impl FromStr for LegacyOtpMetadata {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LegacyOtpMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.created_at.timestamp();
        let micros = self.created_at.timestamp_subsec_micros();
        write!(
            f,
            "{secs}.{micros:06}:{}:{}",
            self.verification_attempts, self.resend_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fractional_timestamp() {
        let meta = LegacyOtpMetadata::parse("1700000000.25:2:1").unwrap();
        assert_eq!(meta.created_at.timestamp(), 1_700_000_000);
        assert_eq!(meta.created_at.timestamp_subsec_micros(), 250_000);
        assert_eq!(meta.verification_attempts, 2);
        assert_eq!(meta.resend_count, 1);
    }

    #[test]
    fn test_parse_integer_timestamp() {
        let meta: LegacyOtpMetadata = "1000:0:0".parse().unwrap();
        assert_eq!(meta.created_at.timestamp(), 1_000);
        assert_eq!(meta.verification_attempts, 0);
    }

    #[test]
    fn test_display() {
        let meta = LegacyOtpMetadata {
            created_at: DateTime::from_timestamp(1_000, 500_000_000).unwrap(),
            verification_attempts: 3,
            resend_count: 5,
        };
        assert_eq!(meta.to_string(), "1000.500000:3:5");
        assert_eq!(LegacyOtpMetadata::parse(&meta.to_string()).unwrap(), meta);
    }

    #[test]
    fn test_wrong_field_count() {
        assert_eq!(
            LegacyOtpMetadata::parse("1000:0"),
            Err(MetadataError::FieldCount(2))
        );
        assert_eq!(
            LegacyOtpMetadata::parse("1000:0:0:0"),
            Err(MetadataError::FieldCount(4))
        );
        assert_eq!(LegacyOtpMetadata::parse(""), Err(MetadataError::FieldCount(1)));
    }

    #[test]
    fn test_non_numeric_fields() {
        assert!(matches!(
            LegacyOtpMetadata::parse("yesterday:0:0"),
            Err(MetadataError::Timestamp(_))
        ));
        assert!(matches!(
            LegacyOtpMetadata::parse("1000:x:0"),
            Err(MetadataError::Counter(_))
        ));
        assert!(matches!(
            LegacyOtpMetadata::parse("1000:0:-1"),
            Err(MetadataError::Counter(_))
        ));
        assert!(matches!(
            LegacyOtpMetadata::parse("-5:0:0"),
            Err(MetadataError::Timestamp(_))
        ));
        assert!(matches!(
            LegacyOtpMetadata::parse("NaN:0:0"),
            Err(MetadataError::Timestamp(_))
        ));
    }

    #[test]
    fn test_into_cycle() {
        let cycle = LegacyOtpMetadata::parse("1000:4:2")
            .unwrap()
            .into_cycle("$argon2id$stub", false);
        assert_eq!(cycle.verification_attempts, 4);
        assert_eq!(cycle.resend_count, 2);
        assert_eq!(cycle.secret_hash, "$argon2id$stub");
        assert_eq!(LegacyOtpMetadata::from_cycle(&cycle).to_string(), "1000.000000:4:2");
    }
}
