//! Account registration and OTP-backed verification.

mod notifier;
mod service;
pub mod validation;

pub use notifier::{LogNotifier, NotifyError, OtpMessage, OtpNotifier, OTP_BODY, OTP_SUBJECT};
pub use service::AccountService;
pub use validation::ValidationError;
