//! Account service driving the OTP lifecycle.
//!
//! Decides when codes are issued, checked and re-sent, and records the
//! result on the account.

use std::sync::Arc;

use tracing::info;

use super::notifier::{dispatch, OtpMessage, OtpNotifier};
use super::validation::{validate_email, validate_name, validate_phone_number, ValidationError};
use crate::config::{Config, MailConfig};
use crate::db::{Account, AccountRepository, Database, NewAccount};
use crate::otp::{CodeHasher, OtpCode, OtpManager, OtpPolicy, ResendDecision, ResendOutcome, VerifyOutcome};
use crate::{PulseError, Result};

/// Registration, code issuance and verification for accounts.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<Database>,
    otp: OtpManager,
    notifier: Arc<dyn OtpNotifier>,
    mail: MailConfig,
}

impl AccountService {
    /// Create a service from its parts.
    pub fn new(
        db: Arc<Database>,
        otp: OtpManager,
        notifier: Arc<dyn OtpNotifier>,
        mail: MailConfig,
    ) -> Self {
        Self {
            db,
            otp,
            notifier,
            mail,
        }
    }

    /// Build the service and its OTP manager from configuration.
    pub fn from_config(
        db: Arc<Database>,
        config: &Config,
        notifier: Arc<dyn OtpNotifier>,
    ) -> Result<Self> {
        let hasher = CodeHasher::from_config(&config.otp)?;
        let otp = OtpManager::new(Arc::clone(&db), OtpPolicy::from(&config.otp), hasher);
        Ok(Self::new(db, otp, notifier, config.mail.clone()))
    }

    /// The underlying OTP manager.
    pub fn otp(&self) -> &OtpManager {
        &self.otp
    }

    fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(self.db.pool())
    }

    /// Register a new account.
    ///
    /// Unless the account is created pre-verified, a code is issued and
    /// handed to the notifier.
    pub async fn register(&self, new_account: NewAccount) -> Result<Account> {
        let mut new_account = new_account;
        new_account.email = new_account.email.trim().to_string();

        validate_email(&new_account.email)?;
        if let Some(ref phone) = new_account.phone_number {
            validate_phone_number(phone)?;
        }
        validate_name(&new_account.first_name)?;
        validate_name(&new_account.last_name)?;

        let accounts = self.accounts();
        if accounts.email_exists(&new_account.email).await? {
            return Err(ValidationError::EmailTaken.into());
        }
        if let Some(ref phone) = new_account.phone_number {
            if accounts.phone_number_exists(phone).await? {
                return Err(ValidationError::PhoneTaken.into());
            }
        }

        let account = accounts.create(&new_account).await?;
        info!(
            account_id = account.id,
            role = %account.role,
            "New account registered"
        );

        if !account.is_otp_verified {
            let code = self.otp.generate(account.id).await?;
            self.deliver(&account, &code);
        }

        Ok(account)
    }

    /// Look up an active account by email.
    pub async fn find_active(&self, email: &str) -> Result<Account> {
        let account = self
            .accounts()
            .get_by_email(email)
            .await?
            .ok_or_else(|| PulseError::NotFound("account".to_string()))?;

        if !account.is_active {
            return Err(PulseError::Auth("account is inactive".to_string()));
        }
        Ok(account)
    }

    /// Start a new cycle for an existing account and deliver the code.
    pub async fn issue_code(&self, email: &str) -> Result<()> {
        let account = self.find_active(email).await?;
        let code = self.otp.generate(account.id).await?;
        self.deliver(&account, &code);
        Ok(())
    }

    /// Check a code; on success the account is marked verified.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<VerifyOutcome> {
        let account = self.find_active(email).await?;
        let outcome = self.otp.verify(account.id, code.trim()).await?;

        if outcome.is_success() && !account.is_otp_verified {
            self.accounts().set_otp_verified(account.id, true).await?;
            info!(account_id = account.id, "Account verified");
        }
        Ok(outcome)
    }

    /// Re-send a code if the throttle allows it.
    ///
    /// `Allowed` means a new code was issued and handed to the notifier.
    pub async fn resend_code(&self, email: &str) -> Result<ResendDecision> {
        let account = self.find_active(email).await?;
        match self.otp.resend(account.id).await? {
            ResendOutcome::Sent(code) => {
                self.deliver(&account, &code);
                Ok(ResendDecision::Allowed)
            }
            ResendOutcome::Denied(reason) => Ok(ResendDecision::Denied(reason)),
        }
    }

    fn deliver(&self, account: &Account, code: &OtpCode) {
        let minutes = self.otp.policy().expiry.as_secs().div_ceil(60);
        let message = OtpMessage::render(account, code, &self.mail, minutes);
        dispatch(&self.notifier, &self.mail, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::account::{NotifyError, OTP_SUBJECT};
    use crate::otp::OtpError;

    struct RecordingNotifier {
        tx: mpsc::UnboundedSender<OtpMessage>,
    }

    impl OtpNotifier for RecordingNotifier {
        fn deliver(&self, message: &OtpMessage) -> std::result::Result<(), NotifyError> {
            self.tx
                .send(message.clone())
                .map_err(|e| NotifyError::Transport(e.to_string()))
        }
    }

    struct FailingNotifier;

    impl OtpNotifier for FailingNotifier {
        fn deliver(&self, _message: &OtpMessage) -> std::result::Result<(), NotifyError> {
            Err(NotifyError::Transport("smtp unreachable".to_string()))
        }
    }

    async fn service_with(
        notifier: Arc<dyn OtpNotifier>,
        mail: MailConfig,
    ) -> AccountService {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let otp = OtpManager::new(
            Arc::clone(&db),
            OtpPolicy::default(),
            CodeHasher::new(64, 1, 1).unwrap(),
        );
        AccountService::new(db, otp, notifier, mail)
    }

    async fn setup() -> (AccountService, mpsc::UnboundedReceiver<OtpMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = service_with(Arc::new(RecordingNotifier { tx }), MailConfig::default()).await;
        (service, rx)
    }

    async fn next_code(rx: &mut mpsc::UnboundedReceiver<OtpMessage>) -> String {
        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("notifier channel closed");
        let (_, rest) = message
            .body
            .split_once("verification code is: ")
            .expect("code line missing");
        rest.chars().take(6).collect()
    }

    #[tokio::test]
    async fn test_register_sends_code() {
        let (service, mut rx) = setup().await;
        let account = service
            .register(NewAccount::new("  jane@example.com ").with_name("Jane", "Doe"))
            .await
            .unwrap();

        assert_eq!(account.email, "jane@example.com");
        assert!(!account.is_otp_verified);

        let code = next_code(&mut rx).await;
        assert_eq!(code.len(), 6);
        assert!(service.otp().state(account.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_register_pre_verified_skips_code() {
        let (service, mut rx) = setup().await;
        let account = service
            .register(NewAccount::new("admin@example.com").pre_verified())
            .await
            .unwrap();

        assert!(account.is_otp_verified);
        assert!(service.otp().state(account.id).await.unwrap().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_and_duplicates() {
        let (service, _rx) = setup().await;

        let result = service.register(NewAccount::new("not-an-email")).await;
        assert!(matches!(result, Err(PulseError::Validation(_))));

        let result = service
            .register(NewAccount::new("jane@example.com").with_phone_number("12ab"))
            .await;
        assert!(matches!(result, Err(PulseError::Validation(_))));

        service
            .register(NewAccount::new("jane@example.com").with_phone_number("+639171234567"))
            .await
            .unwrap();

        let result = service.register(NewAccount::new("JANE@example.com")).await;
        assert!(
            matches!(result, Err(PulseError::Validation(ref msg)) if msg == &ValidationError::EmailTaken.to_string())
        );

        let result = service
            .register(NewAccount::new("john@example.com").with_phone_number("+639171234567"))
            .await;
        assert!(
            matches!(result, Err(PulseError::Validation(ref msg)) if msg == &ValidationError::PhoneTaken.to_string())
        );
    }

    #[tokio::test]
    async fn test_verify_code_marks_account() {
        let (service, mut rx) = setup().await;
        let account = service
            .register(NewAccount::new("jane@example.com"))
            .await
            .unwrap();
        let code = next_code(&mut rx).await;

        let outcome = service.verify_code("jane@example.com", &code).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);

        let stored = service.find_active("jane@example.com").await.unwrap();
        assert!(stored.is_otp_verified);
        assert!(service.otp().state(account.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_code_wrong_code() {
        let (service, mut rx) = setup().await;
        service.register(NewAccount::new("jane@example.com")).await.unwrap();
        let code = next_code(&mut rx).await;
        let wrong = if code == "111111" { "222222" } else { "111111" };

        let outcome = service.verify_code("jane@example.com", wrong).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Rejected(OtpError::Mismatch));
        assert!(!service.find_active("jane@example.com").await.unwrap().is_otp_verified);
    }

    #[tokio::test]
    async fn test_resend_code_throttled() {
        let (service, mut rx) = setup().await;
        service.register(NewAccount::new("jane@example.com")).await.unwrap();
        next_code(&mut rx).await;

        let decision = service.resend_code("jane@example.com").await.unwrap();
        assert!(matches!(
            decision,
            ResendDecision::Denied(OtpError::ResendTooSoon { .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_issue_code_replaces_cycle() {
        let (service, mut rx) = setup().await;
        service.register(NewAccount::new("jane@example.com")).await.unwrap();
        let first = next_code(&mut rx).await;

        service.issue_code("jane@example.com").await.unwrap();
        let second = next_code(&mut rx).await;

        if first != second {
            assert_eq!(
                service.verify_code("jane@example.com", &first).await.unwrap(),
                VerifyOutcome::Rejected(OtpError::Mismatch)
            );
        }
        assert_eq!(
            service.verify_code("jane@example.com", &second).await.unwrap(),
            VerifyOutcome::Verified
        );
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_accounts() {
        let (service, _rx) = setup().await;
        assert!(matches!(
            service.issue_code("ghost@example.com").await,
            Err(PulseError::NotFound(_))
        ));

        let account = service
            .register(NewAccount::new("jane@example.com").pre_verified())
            .await
            .unwrap();
        AccountRepository::new(service.db.pool())
            .set_active(account.id, false)
            .await
            .unwrap();

        assert!(matches!(
            service.verify_code("jane@example.com", "123456").await,
            Err(PulseError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_fail_register() {
        let service = service_with(Arc::new(FailingNotifier), MailConfig::default()).await;
        let account = service
            .register(NewAccount::new("jane@example.com"))
            .await
            .unwrap();
        assert!(service.otp().state(account.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mail_disabled_skips_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mail = MailConfig {
            enabled: false,
            ..MailConfig::default()
        };
        let service = service_with(Arc::new(RecordingNotifier { tx }), mail).await;

        service.register(NewAccount::new("jane@example.com")).await.unwrap();
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_message_subject() {
        let (service, mut rx) = setup().await;
        service.register(NewAccount::new("jane@example.com")).await.unwrap();
        let message = rx.recv().await.unwrap();
        assert_eq!(message.subject, OTP_SUBJECT.replace("{site_name}", "PulsePlane"));
        assert!(message.body.contains("expires in 10 minutes"));
    }
}
