//! Input validation for account registration.

use thiserror::Error;

use crate::PulseError;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Minimum digits in a phone number.
pub const MIN_PHONE_DIGITS: usize = 9;

/// Maximum digits in a phone number.
pub const MAX_PHONE_DIGITS: usize = 15;

/// Maximum length of a first or last name.
pub const MAX_NAME_LENGTH: usize = 150;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Email is empty.
    #[error("email is required")]
    EmailEmpty,

    /// Email is too long.
    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    EmailTooLong,

    /// Email format is invalid.
    #[error("invalid email format")]
    EmailInvalidFormat,

    /// Phone number format is invalid.
    #[error("phone number must be {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits with an optional leading +")]
    PhoneInvalidFormat,

    /// A name is too long.
    #[error("names must be at most {MAX_NAME_LENGTH} characters")]
    NameTooLong,

    /// Email is taken.
    #[error("email is already registered")]
    EmailTaken,

    /// Phone number is taken.
    #[error("phone number is already registered")]
    PhoneTaken,
}

impl From<ValidationError> for PulseError {
    fn from(e: ValidationError) -> Self {
        PulseError::Validation(e.to_string())
    }
}

/// Validate an email address.
///
/// The check is deliberately loose: one `@`, a non-empty local part, a
/// dotted domain with no empty labels, and no whitespace.
///
/// # Examples
///
/// ```
/// use pulseplane::account::validation::validate_email;
///
/// assert!(validate_email("jane@example.com").is_ok());
/// assert!(validate_email("jane@localhost").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::EmailEmpty);
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::EmailInvalidFormat);
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ValidationError::EmailInvalidFormat);
    }
    if domain.split('.').any(str::is_empty) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    Ok(())
}

/// Validate a phone number: an optional leading `+` followed by 9 to 15
/// ASCII digits.
pub fn validate_phone_number(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let valid = (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::PhoneInvalidFormat)
    }
}

/// Validate a first or last name.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong);
    }
    Ok(())
}
