//! Account repository for PulsePlane.

use super::account::{Account, NewAccount};
use super::DbPool;
use crate::{PulseError, Result};

const ACCOUNT_COLUMNS: &str = "id, email, phone_number, first_name, last_name, role,
                               is_otp_verified, is_active, created_at";

/// Repository for account operations.
pub struct AccountRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new account.
    ///
    /// Returns the created account with the assigned ID.
    pub async fn create(&self, new_account: &NewAccount) -> Result<Account> {
        let result = sqlx::query(
            "INSERT INTO accounts (email, phone_number, first_name, last_name, role, is_otp_verified)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_account.email)
        .bind(&new_account.phone_number)
        .bind(&new_account.first_name)
        .bind(&new_account.last_name)
        .bind(new_account.role.as_str())
        .bind(new_account.is_otp_verified)
        .execute(self.pool)
        .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| PulseError::NotFound("account".to_string()))
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(account)
    }

    /// Get an account by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ? COLLATE NOCASE");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email.trim())
            .fetch_optional(self.pool)
            .await?;
        Ok(account)
    }

    /// Check if an email is already registered.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = ? COLLATE NOCASE)",
        )
        .bind(email.trim())
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Check if a phone number is already registered.
    pub async fn phone_number_exists(&self, phone_number: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE phone_number = ?)")
                .bind(phone_number)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Set the OTP verification flag.
    ///
    /// Returns false if the account does not exist.
    pub async fn set_otp_verified(&self, id: i64, verified: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET is_otp_verified = ? WHERE id = ?")
            .bind(verified)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Activate or deactivate an account.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;
    use crate::Database;

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());

        let account = repo
            .create(
                &NewAccount::new("jane@example.com")
                    .with_name("Jane", "Doe")
                    .with_role(Role::Admin),
            )
            .await
            .unwrap();

        assert_eq!(account.id, 1);
        assert_eq!(account.email, "jane@example.com");
        assert_eq!(account.role, Role::Admin);
        assert!(!account.is_otp_verified);
        assert!(account.is_active);

        let fetched = repo.get_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(fetched.full_name(), "Jane Doe");
    }

    #[tokio::test]
    async fn test_get_by_email_case_insensitive() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        repo.create(&NewAccount::new("Jane@Example.com")).await.unwrap();

        assert!(repo.get_by_email("jane@example.com").await.unwrap().is_some());
        assert!(repo.email_exists("JANE@EXAMPLE.COM").await.unwrap());
        assert!(!repo.email_exists("john@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        repo.create(&NewAccount::new("jane@example.com")).await.unwrap();

        let result = repo.create(&NewAccount::new("JANE@example.com")).await;
        assert!(matches!(result, Err(PulseError::Database(_))));
    }

    #[tokio::test]
    async fn test_phone_number_exists() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        repo.create(&NewAccount::new("jane@example.com").with_phone_number("+15551234567"))
            .await
            .unwrap();

        assert!(repo.phone_number_exists("+15551234567").await.unwrap());
        assert!(!repo.phone_number_exists("+15550000000").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_flags() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        let account = repo.create(&NewAccount::new("jane@example.com")).await.unwrap();

        assert!(repo.set_otp_verified(account.id, true).await.unwrap());
        assert!(repo.set_active(account.id, false).await.unwrap());

        let fetched = repo.get_by_id(account.id).await.unwrap().unwrap();
        assert!(fetched.is_otp_verified);
        assert!(!fetched.is_active);

        assert!(!repo.set_otp_verified(999, true).await.unwrap());
    }
}
