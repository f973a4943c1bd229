//! Database schema definitions for PulsePlane.
//!
//! This module contains the migrations applied in order when the database
//! is first opened or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script. The schema_version table tracks which
/// migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: accounts
    r#"
CREATE TABLE accounts (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    email            TEXT NOT NULL UNIQUE COLLATE NOCASE,
    phone_number     TEXT UNIQUE,
    first_name       TEXT NOT NULL DEFAULT '',
    last_name        TEXT NOT NULL DEFAULT '',
    role             TEXT NOT NULL DEFAULT 'staff',   -- 'admin', 'staff'
    is_otp_verified  INTEGER NOT NULL DEFAULT 0,
    is_active        INTEGER NOT NULL DEFAULT 1,
    created_at       TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_accounts_role ON accounts(role);
"#,
    // v2: one OTP cycle per account; no row means no active cycle
    r#"
CREATE TABLE otp_cycles (
    account_id             INTEGER PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
    secret_hash            TEXT NOT NULL,
    created_at             TEXT NOT NULL,
    verification_attempts  INTEGER NOT NULL DEFAULT 0,
    resend_count           INTEGER NOT NULL DEFAULT 0,
    verified               INTEGER NOT NULL DEFAULT 0
);
"#,
];
