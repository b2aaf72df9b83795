//! An [`Authenticator`] that accepts any username/password pair.

use super::{AuthenticationError, Authenticator, UserDetail};
use async_trait::async_trait;
use std::fmt::{self, Display, Formatter};

/// Accepts every login attempt, mirroring the classic anonymous-FTP posture.
/// Useful for quick starts and for tests; production deployments supply a
/// real [`Authenticator`] instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousAuthenticator;

/// The [`UserDetail`] handed back by [`AnonymousAuthenticator`]: just the
/// name the client presented, with the default home permission set and no
/// home confinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymousUser {
    /// The username presented at `USER`, preserved for logging/`MLST`/etc.
    pub username: String,
}

impl Display for AnonymousUser {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.username)
    }
}

impl UserDetail for AnonymousUser {}

#[async_trait]
impl Authenticator<AnonymousUser> for AnonymousAuthenticator {
    async fn authenticate(&self, username: &str, _password: &str) -> Result<AnonymousUser, AuthenticationError> {
        Ok(AnonymousUser { username: username.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_any_credentials() {
        let auth = AnonymousAuthenticator;
        let user = auth.authenticate("Finn", "I love PB").await.unwrap();
        assert_eq!(user.username, "Finn");
    }
}
