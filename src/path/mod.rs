//! Virtual path & permission engine (component A).
//!
//! Maps client-visible virtual paths ([`Vpath`]) onto physical filesystem
//! locations through a set of [`Path`] mounts, each carrying an 18-bit
//! [`PathPermissionBits`] bitmap, with longest-prefix-plus-recursive-flag
//! lookup and bottom-up scope merging.

mod normalize;
mod permissions;

pub use normalize::{normalize, normalize_and_split, split, to_vpath};
pub use permissions::{
    default_home_permissions, default_permissions, default_pub_upload_permissions, PathKind, PathPermissionBits, Permissions, VirtualPath,
};

/// A client-visible, unix-style path, always rooted at `/`.
pub type Vpath = String;
/// An OS-native physical path on disk.
pub type Ppath = std::path::PathBuf;
