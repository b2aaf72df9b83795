//! What an authenticated subject is allowed to do.

use crate::path::{PathPermissionBits, Permissions};
use std::fmt::{self, Debug, Display, Formatter};
use std::path::{Path, PathBuf};

/// Describes an authenticated subject: whether the account is usable, what
/// home directory (if any) it is restricted to, and what it may do against
/// the virtual path/permission engine.
///
/// Unlike the storage-backend lineage this engine descends from — where
/// `storage_permissions` returns a small flag set interpreted by an external
/// `StorageBackend` — the virtual path/permission engine is intrinsic core
/// here, so [`UserDetail::storage_permissions`] returns the full 18-bit
/// [`PathPermissionBits`] that governs the subject's home mount directly.
pub trait UserDetail: Send + Sync + Display + Debug {
    /// Whether this subject's account is currently usable. Checked right
    /// after a successful [`super::Authenticator::authenticate`] call; a
    /// `false` here turns an otherwise-successful login into
    /// [`super::AuthenticationError::AccountDisabled`].
    fn account_enabled(&self) -> bool {
        true
    }

    /// The subject's home directory, if confined to one. When present, a
    /// mount rooted at `/` with this physical path and
    /// [`UserDetail::storage_permissions`] is added to the session's
    /// effective [`Permissions`] at login.
    fn home(&self) -> Option<&Path> {
        None
    }

    /// The permission bits granted on the subject's home mount. The default
    /// grants a full recursive home directory.
    fn storage_permissions(&self) -> PathPermissionBits {
        crate::path::default_home_permissions()
    }

    /// Builds the [`Permissions`] set this subject should log in with, by
    /// mounting [`UserDetail::home`] (if any) at `/` with
    /// [`UserDetail::storage_permissions`], then merging `base` underneath
    /// it (the subject's own mount dominates any overlapping entry in
    /// `base`, per [`Permissions::merge`]'s receiver-dominates rule).
    fn build_session_permissions(&self, base: &Permissions) -> Permissions {
        let mut perms = Permissions::new();
        if let Some(home) = self.home() {
            let _ = perms.add_path(crate::path::VirtualPath::new("/", home.to_path_buf(), self.storage_permissions(), crate::path::PathKind::Directory));
        }
        perms.merge(base);
        perms
    }
}

/// A [`UserDetail`] implementation that carries no information beyond a
/// username, for quick prototyping when the caller doesn't need per-user
/// authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultUser {
    /// The name presented at `USER`.
    pub username: String,
    /// The physical directory this user is confined to, if any.
    pub home: Option<PathBuf>,
}

impl DefaultUser {
    /// A user with no home confinement and full default home permissions.
    pub fn new(username: impl Into<String>) -> Self {
        DefaultUser { username: username.into(), home: None }
    }

    /// A user confined to `home`.
    pub fn with_home(username: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        DefaultUser { username: username.into(), home: Some(home.into()) }
    }
}

impl UserDetail for DefaultUser {
    fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }
}

impl Display for DefaultUser {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.username)
    }
}
