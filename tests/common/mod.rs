//! Shared helpers for integration tests.

use std::sync::Arc;

use pulseplane::db::{AccountRepository, NewAccount};
use pulseplane::otp::ManualClock;
use pulseplane::{CodeHasher, Database, OtpManager, OtpPolicy};

/// Epoch second the test clock starts at.
pub const T0: i64 = 1_000;

/// Cheap hash parameters so tests stay fast.
pub fn test_hasher() -> CodeHasher {
    CodeHasher::new(64, 1, 1).unwrap()
}

/// In-memory database, one account and a manager on a manual clock.
pub async fn setup(policy: OtpPolicy) -> (Arc<Database>, OtpManager, ManualClock, i64) {
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let account_id = create_account(&db, "jane@example.com").await;
    let clock = ManualClock::at_timestamp(T0);
    let manager = OtpManager::new(Arc::clone(&db), policy, test_hasher())
        .with_clock(Arc::new(clock.clone()));
    (db, manager, clock, account_id)
}

/// Create an account and return its ID.
pub async fn create_account(db: &Database, email: &str) -> i64 {
    AccountRepository::new(db.pool())
        .create(&NewAccount::new(email))
        .await
        .unwrap()
        .id
}

/// A code that differs from `code`.
pub fn wrong_code(code: &str) -> &'static str {
    if code == "111111" {
        "222222"
    } else {
        "111111"
    }
}
