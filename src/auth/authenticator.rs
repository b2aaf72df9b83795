//! The authentication service-provider interface.

use super::UserDetail;
use async_trait::async_trait;

/// Why an authentication attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    /// The username is not known to the backing store.
    #[error("unknown user")]
    UnknownUsername,
    /// The username is known but the password did not match.
    #[error("bad password")]
    BadPassword,
    /// The account is known and the password matched, but the account is
    /// disabled (see [`UserDetail::account_enabled`]).
    #[error("account disabled")]
    AccountDisabled,
    /// The backing store could not be reached or returned an unexpected
    /// error; distinct from a simple credential mismatch.
    #[error("authentication backend error: {0}")]
    Backend(String),
}

/// Authenticates a username/password pair against a pluggable backing store.
///
/// Implementors own credential storage entirely; the engine only ever calls
/// [`Authenticator::authenticate`] from the `USER`/`PASS` command handlers.
#[async_trait]
pub trait Authenticator<U>: Send + Sync
where
    U: UserDetail,
{
    /// Authenticates `username` with `password`, returning the subject's
    /// [`UserDetail`] on success.
    async fn authenticate(&self, username: &str, password: &str) -> Result<U, AuthenticationError>;
}
