//! Email notification hook
//!
//! Email delivery itself is out of scope for this core — an external
//! collaborator supplies the actual transport (SMTP, a provider API). The
//! core only owns the decision of *when* to notify, expressed as this
//! narrow trait the dispatcher calls into after a `USER_CREATED` event.
//! Dispatchers take `impl EmailProvider` rather than `dyn`, so no
//! `async_trait` boxing is needed.

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email delivery failed: {0}")]
    DeliveryFailed(String),
}

pub trait EmailProvider: Send + Sync {
    fn send_welcome_email(
        &self,
        to: &str,
        username: &str,
    ) -> impl std::future::Future<Output = Result<(), EmailError>> + Send;
}

/// Default provider used when no real transport is wired in: logs the
/// intent instead of sending anything. Useful for tests and local dev.
#[derive(Debug, Clone, Default)]
pub struct NoopEmailProvider;

impl EmailProvider for NoopEmailProvider {
    async fn send_welcome_email(&self, to: &str, username: &str) -> Result<(), EmailError> {
        tracing::info!(to, username, "welcome email suppressed (no email provider configured)");
        Ok(())
    }
}
