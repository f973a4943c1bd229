//! Account model for PulsePlane.
//!
//! Only the fields the OTP flow needs are modelled here; HR profile data
//! lives elsewhere.

use std::fmt;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Company administrator.
    Admin,
    /// Regular staff member.
    #[default]
    Staff,
}

impl Role {
    /// Convert role to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// A registered account.
#[derive(Debug, Clone)]
pub struct Account {
    /// Unique account ID.
    pub id: i64,
    /// Login email (unique, case-insensitive).
    pub email: String,
    /// Phone number (optional, unique).
    pub phone_number: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Account role.
    pub role: Role,
    /// Whether the account proved control of its contact channel.
    pub is_otp_verified: bool,
    /// Whether the account is active.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: String,
}

impl Account {
    /// Display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Account {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        let role = role.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
            index: "role".to_string(),
            source: e.into(),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            phone_number: row.try_get("phone_number")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            role,
            is_otp_verified: row.try_get("is_otp_verified")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Data for creating a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Login email.
    pub email: String,
    /// Phone number.
    pub phone_number: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Role (defaults to Staff).
    pub role: Role,
    /// Initial verification flag (accounts created by an admin skip the OTP step).
    pub is_otp_verified: bool,
}

impl NewAccount {
    /// Create a new account with minimal required fields.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            phone_number: None,
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Staff,
            is_otp_verified: false,
        }
    }

    /// Set the phone number.
    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    /// Set the name.
    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Mark the account as already verified.
    pub fn pre_verified(mut self) -> Self {
        self.is_otp_verified = true;
        self
    }
}
