//! Configuration module for PulsePlane.

use serde::Deserialize;
use std::path::Path;

use crate::{PulseError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/pulseplane.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/pulseplane.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// One-time passcode configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// Seconds a code stays valid after issuance.
    #[serde(default = "default_otp_expiry")]
    pub expiry_secs: u64,
    /// Failed checks allowed before the cycle locks.
    #[serde(default = "default_otp_max_attempts")]
    pub max_attempts: u32,
    /// Seconds between issuance and the first allowed resend.
    #[serde(default = "default_otp_resend_cooldown")]
    pub resend_cooldown_secs: u64,
    /// Resends allowed before the long lockout applies.
    #[serde(default = "default_otp_max_resends")]
    pub max_resends: u32,
    /// Seconds after which an exhausted cycle is cleared.
    #[serde(default = "default_otp_resend_lockout")]
    pub resend_lockout_secs: u64,
    /// Keep a verified cycle (flagged) until the next issuance instead of clearing it.
    #[serde(default)]
    pub retain_verified: bool,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_otp_hash_memory")]
    pub hash_memory_kib: u32,
    /// Argon2 time cost (iterations).
    #[serde(default = "default_otp_hash_iterations")]
    pub hash_iterations: u32,
    /// Argon2 parallelism.
    #[serde(default = "default_otp_hash_parallelism")]
    pub hash_parallelism: u32,
}

fn default_otp_expiry() -> u64 {
    600 // 10 minutes
}

fn default_otp_max_attempts() -> u32 {
    5
}

fn default_otp_resend_cooldown() -> u64 {
    60
}

fn default_otp_max_resends() -> u32 {
    5
}

fn default_otp_resend_lockout() -> u64 {
    1800 // 30 minutes
}

fn default_otp_hash_memory() -> u32 {
    19456 // 19 MiB
}

fn default_otp_hash_iterations() -> u32 {
    2
}

fn default_otp_hash_parallelism() -> u32 {
    1
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_otp_expiry(),
            max_attempts: default_otp_max_attempts(),
            resend_cooldown_secs: default_otp_resend_cooldown(),
            max_resends: default_otp_max_resends(),
            resend_lockout_secs: default_otp_resend_lockout(),
            retain_verified: false,
            hash_memory_kib: default_otp_hash_memory(),
            hash_iterations: default_otp_hash_iterations(),
            hash_parallelism: default_otp_hash_parallelism(),
        }
    }
}

/// Outgoing mail configuration for code delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Whether codes are handed to the notifier at all.
    #[serde(default = "default_mail_enabled")]
    pub enabled: bool,
    /// Sender address.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Site name used in message subjects.
    #[serde(default = "default_site_name")]
    pub site_name: String,
}

fn default_mail_enabled() -> bool {
    true
}

fn default_from_address() -> String {
    "no-reply@pulseplane.local".to_string()
}

fn default_site_name() -> String {
    "PulsePlane".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: default_mail_enabled(),
            from_address: default_from_address(),
            site_name: default_site_name(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// One-time passcode configuration.
    #[serde(default)]
    pub otp: OtpConfig,
    /// Mail configuration.
    #[serde(default)]
    pub mail: MailConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(PulseError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| PulseError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PULSEPLANE_DATABASE_PATH`: Override the database path
    /// - `PULSEPLANE_LOG_LEVEL`: Override the log level
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("PULSEPLANE_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("PULSEPLANE_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - any OTP window or limit is zero
    /// - the resend lockout is shorter than the resend cooldown
    /// - mail is enabled without a sender address
    pub fn validate(&self) -> Result<()> {
        let otp = &self.otp;
        if otp.expiry_secs == 0 || otp.resend_cooldown_secs == 0 || otp.resend_lockout_secs == 0 {
            return Err(PulseError::Config(
                "otp windows (expiry_secs, resend_cooldown_secs, resend_lockout_secs) must be non-zero"
                    .to_string(),
            ));
        }
        if otp.max_attempts == 0 || otp.max_resends == 0 {
            return Err(PulseError::Config(
                "otp limits (max_attempts, max_resends) must be non-zero".to_string(),
            ));
        }
        if otp.resend_lockout_secs < otp.resend_cooldown_secs {
            return Err(PulseError::Config(
                "otp.resend_lockout_secs must not be shorter than otp.resend_cooldown_secs"
                    .to_string(),
            ));
        }
        if self.mail.enabled && self.mail.from_address.trim().is_empty() {
            return Err(PulseError::Config(
                "mail is enabled but mail.from_address is not set".to_string(),
            ));
        }
        Ok(())
    }
}
