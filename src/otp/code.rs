//! Plaintext one-time codes.

use std::fmt;

use rand::Rng;

/// Number of digits in a code.
pub const CODE_LENGTH: usize = 6;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// A plaintext one-time code.
///
/// This is the only place the code exists outside its hash. `Debug` is
/// redacted so the value does not end up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Wrap an existing code string.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The digits, for delivery to the account holder.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// Draw a fresh 6-digit code (100000..=999999).
pub fn generate_code() -> OtpCode {
    let value = rand::rng().random_range(CODE_MIN..=CODE_MAX);
    OtpCode(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_shape() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.as_str().len(), CODE_LENGTH);
            assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.as_str().as_bytes()[0], b'0');
        }
    }

    #[test]
    fn test_debug_is_redacted() {
        let code = OtpCode::new("482913");
        let debug = format!("{code:?}");
        assert!(!debug.contains("482913"));
        assert_eq!(code.as_str(), "482913");
    }
}
