//! One-time passcode lifecycle.
//!
//! A cycle starts when a code is issued for an account and ends when the
//! code is verified, or when an exhausted cycle ages past the resend lockout.
//! The pure state machine lives in [`OtpCycle`] and [`OtpPolicy`];
//! [`OtpManager`] loads and stores cycles through the database.

mod clock;
mod code;
mod cycle;
mod hasher;
mod manager;
mod metadata;
mod outcome;
mod policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use code::{generate_code, OtpCode, CODE_LENGTH};
pub use cycle::{check_resend, OtpCycle, OtpSummary, Precheck};
pub use hasher::{CodeHasher, HashError};
pub use manager::OtpManager;
pub use metadata::{LegacyOtpMetadata, MetadataError};
pub use outcome::{OtpError, ResendDecision, ResendOutcome, VerifyOutcome};
pub use policy::OtpPolicy;
