//! PulsePlane - one-time passcode lifecycle for the HR account service.
//!
//! Issues, verifies and throttles one-time codes bound to accounts, with
//! hashed storage in SQLite.

pub mod account;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod otp;

pub use account::{AccountService, LogNotifier, OtpMessage, OtpNotifier};
pub use config::Config;
pub use db::{Account, AccountRepository, Database, NewAccount, OtpRepository, Role};
pub use error::{PulseError, Result};
pub use otp::{
    CodeHasher, OtpCode, OtpCycle, OtpError, OtpManager, OtpPolicy, ResendDecision,
    ResendOutcome, VerifyOutcome,
};
