/// Verification mail delivery
///
/// Registration hands the plaintext verification token to a
/// [`VerificationMailer`]. Delivery (SMTP, a queue, a third-party API) lives
/// behind the trait; [`LogMailer`] only records that a mail would be sent.

use async_trait::async_trait;
use tracing::info;

/// Mailer error types
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("Failed to deliver verification mail: {0}")]
    DeliveryFailed(String),
}

/// Everything a verification mail needs
#[derive(Clone)]
pub struct VerificationMail {
    pub recipient: String,
    pub tenant_slug: String,
    pub token: String,
}

impl std::fmt::Debug for VerificationMail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationMail")
            .field("recipient", &self.recipient)
            .field("tenant_slug", &self.tenant_slug)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait VerificationMailer: Send + Sync {
    /// Delivers the token to the recipient
    async fn send(&self, mail: VerificationMail) -> Result<(), MailerError>;
}

/// Logs the recipient of each verification mail and drops the token
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl VerificationMailer for LogMailer {
    async fn send(&self, mail: VerificationMail) -> Result<(), MailerError> {
        info!(
            recipient = %mail.recipient,
            tenant_slug = %mail.tenant_slug,
            "Verification mail dispatched"
        );
        Ok(())
    }
}
