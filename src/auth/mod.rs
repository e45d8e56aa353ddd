//! Password hashing hook
//!
//! Password hashing itself is out of scope for this core — an external
//! collaborator owns the actual algorithm (bcrypt, argon2, whatever the
//! auth service standardizes on). The core only owns the decision of
//! *when* to hash, expressed as this narrow trait the HTTP layer calls
//! before handing a command to `CreateUserHandler`/`ChangePasswordHandler`,
//! which only ever see `(password_hash, hashing_method)`. Mirrors
//! `crate::projection::EmailProvider`'s native async-fn-in-trait shape —
//! no `async_trait` boxing needed.

#[derive(Debug, thiserror::Error)]
pub enum PasswordHashError {
    #[error("password hashing failed: {0}")]
    HashingFailed(String),
}

pub trait PasswordHasher: Send + Sync {
    /// Returns `(password_hash, hashing_method)`.
    fn hash(&self, plaintext: &str) -> impl std::future::Future<Output = Result<(String, String), PasswordHashError>> + Send;

    fn verify(
        &self,
        plaintext: &str,
        password_hash: &str,
        hashing_method: &str,
    ) -> impl std::future::Future<Output = Result<bool, PasswordHashError>> + Send;
}

/// Default hasher used when no real algorithm is wired in. Stores
/// passwords as-is under the `"plaintext"` method, which
/// `ChangePasswordHandler`'s `PasswordMustBeDifferent` check and any real
/// deployment's auth service should never be configured with — it exists
/// for tests and local dev, matching `NoopEmailProvider`'s role for email.
#[derive(Debug, Clone, Default)]
pub struct NoopPasswordHasher;

impl PasswordHasher for NoopPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<(String, String), PasswordHashError> {
        Ok((plaintext.to_string(), "plaintext".to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        password_hash: &str,
        hashing_method: &str,
    ) -> Result<bool, PasswordHashError> {
        Ok(hashing_method == "plaintext" && plaintext == password_hash)
    }
}
