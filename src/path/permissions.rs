//! Mounts ([`VirtualPath`]) and the [`Permissions`] container that resolves
//! a client-supplied vpath to one, plus the 18-bit permission bitmap.

use super::{normalize, to_vpath, Ppath, Vpath};
use crate::error::EngineError;
use bitflags::bitflags;
use std::path::Path as StdPath;

bitflags! {
    /// The 18 independent permission bits a [`VirtualPath`] mount carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct PathPermissionBits: u32 {
        /// Read the contents of a file.
        const CAN_READ = 1 << 0;
        /// Write to / overwrite a file.
        const CAN_WRITE = 1 << 1;
        /// Traverse through a directory without listing it.
        const CAN_EXECUTE = 1 << 2;
        /// `CWD` into a directory.
        const CAN_ENTER = 1 << 3;
        /// `LIST`/`NLST`/`MLSD` a directory's contents.
        const CAN_LIST = 1 << 4;
        /// `MKD` under this mount.
        const CAN_CREATE_DIR = 1 << 5;
        /// `STOR`/`STOU`/`APPE` a new file under this mount.
        const CAN_CREATE_FILE = 1 << 6;
        /// `DELE` a file.
        const CAN_DELETE_FILE = 1 << 7;
        /// `RMD` a directory.
        const CAN_DELETE_DIR = 1 << 8;
        /// Include dotfiles in directory listings.
        const CAN_SEE_HIDDEN_FILES = 1 << 9;
        /// Include dot-directories in directory listings.
        const CAN_SEE_HIDDEN_DIRS = 1 << 10;
        /// Create a file whose name starts with `.`.
        const CAN_CREATE_HIDDEN_FILES = 1 << 11;
        /// Create a directory whose name starts with `.`.
        const CAN_CREATE_HIDDEN_DIRS = 1 << 12;
        /// `MFMT`/internal mtime adjustment on upload.
        const CAN_SET_TIMESTAMP = 1 << 13;
        /// Change a mount's own permission bits at runtime.
        const CAN_SET_PERMISSIONS = 1 << 14;
        /// `RNFR`/`RNTO` a file or directory.
        const CAN_RENAME = 1 << 15;
        /// This mount's permissions apply to descendants lacking a closer mount.
        const IS_RECURSIVE = 1 << 16;
        /// Uploads under this mount are shared (unimplemented behaviour; flag exists for config compatibility).
        const IS_SHARED_UPLOAD_DIR = 1 << 17;
    }
}

impl PathPermissionBits {
    /// Parses a comma-separated literal such as `"CAN_READ,CAN_LIST,IS_RECURSIVE"`.
    pub fn parse_list(literal: &str) -> Result<Self, EngineError> {
        let mut bits = PathPermissionBits::empty();
        for token in literal.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            bits |= Self::from_name(token).ok_or_else(|| EngineError::ClientParse(format!("unknown permission bit: {token}")))?;
        }
        Ok(bits)
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "CAN_READ" => Self::CAN_READ,
            "CAN_WRITE" => Self::CAN_WRITE,
            "CAN_EXECUTE" => Self::CAN_EXECUTE,
            "CAN_ENTER" => Self::CAN_ENTER,
            "CAN_LIST" => Self::CAN_LIST,
            "CAN_CREATE_DIR" => Self::CAN_CREATE_DIR,
            "CAN_CREATE_FILE" => Self::CAN_CREATE_FILE,
            "CAN_DELETE_FILE" => Self::CAN_DELETE_FILE,
            "CAN_DELETE_DIR" => Self::CAN_DELETE_DIR,
            "CAN_SEE_HIDDEN_FILES" => Self::CAN_SEE_HIDDEN_FILES,
            "CAN_SEE_HIDDEN_DIRS" => Self::CAN_SEE_HIDDEN_DIRS,
            "CAN_CREATE_HIDDEN_FILES" => Self::CAN_CREATE_HIDDEN_FILES,
            "CAN_CREATE_HIDDEN_DIRS" => Self::CAN_CREATE_HIDDEN_DIRS,
            "CAN_SET_TIMESTAMP" => Self::CAN_SET_TIMESTAMP,
            "CAN_SET_PERMISSIONS" => Self::CAN_SET_PERMISSIONS,
            "CAN_RENAME" => Self::CAN_RENAME,
            "IS_RECURSIVE" => Self::IS_RECURSIVE,
            "IS_SHARED_UPLOAD_DIR" => Self::IS_SHARED_UPLOAD_DIR,
            _ => return None,
        })
    }
}

/// The default permission set granted to an ordinary recursive mount:
/// list, enter, read, recursive.
pub fn default_permissions() -> PathPermissionBits {
    PathPermissionBits::CAN_LIST | PathPermissionBits::CAN_ENTER | PathPermissionBits::CAN_READ | PathPermissionBits::IS_RECURSIVE
}

/// The default permission set for a user's home directory: full read/write
/// file and directory operations, recursive.
pub fn default_home_permissions() -> PathPermissionBits {
    PathPermissionBits::CAN_LIST
        | PathPermissionBits::CAN_ENTER
        | PathPermissionBits::CAN_READ
        | PathPermissionBits::CAN_WRITE
        | PathPermissionBits::CAN_CREATE_FILE
        | PathPermissionBits::CAN_DELETE_FILE
        | PathPermissionBits::CAN_RENAME
        | PathPermissionBits::CAN_CREATE_DIR
        | PathPermissionBits::CAN_DELETE_DIR
        | PathPermissionBits::CAN_SET_TIMESTAMP
        | PathPermissionBits::IS_RECURSIVE
        | PathPermissionBits::CAN_SET_PERMISSIONS
}

/// The default permission set for a shared, anonymous-upload style mount:
/// visible and enterable, but not listable/readable, flagged shared.
pub fn default_pub_upload_permissions() -> PathPermissionBits {
    PathPermissionBits::CAN_LIST | PathPermissionBits::CAN_ENTER | PathPermissionBits::IS_SHARED_UPLOAD_DIR
}

/// What kind of filesystem node a [`VirtualPath`] denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// Either; used for queries that don't care.
    Any,
}

/// A single mount: a vpath bound to a ppath with a permission bitmap.
///
/// Immutable after construction. Copies are produced when permissions are
/// projected through merging, or when [`VirtualPath::create_subpath`]
/// derives a child.
#[derive(Debug, Clone)]
pub struct VirtualPath {
    vpath: Vpath,
    ppath: Ppath,
    bits: PathPermissionBits,
    kind: PathKind,
}

impl VirtualPath {
    /// Builds a new mount. `vpath` is made root-anchored (a leading `/` is
    /// added if missing) but is otherwise taken as-is; callers that accept
    /// untrusted input should normalize first.
    pub fn new(vpath: impl Into<Vpath>, ppath: impl Into<Ppath>, bits: PathPermissionBits, kind: PathKind) -> Self {
        let mut vpath = vpath.into();
        if !vpath.is_empty() && !vpath.starts_with('/') {
            vpath = format!("/{vpath}");
        }
        VirtualPath { vpath, ppath: ppath.into(), bits, kind }
    }

    /// The client-visible path.
    pub fn vpath(&self) -> &str {
        &self.vpath
    }

    /// The OS-native path this mount resolves to.
    pub fn ppath(&self) -> &StdPath {
        &self.ppath
    }

    /// This mount's permission bitmap.
    pub fn bits(&self) -> PathPermissionBits {
        self.bits
    }

    /// What kind of node this mount denotes.
    pub fn kind(&self) -> PathKind {
        self.kind
    }

    /// Whether the physical path this mount resolves to currently exists
    /// (as the kind this mount claims to be).
    pub fn exists(&self) -> bool {
        match self.kind {
            PathKind::File => self.ppath.is_file(),
            PathKind::Directory => self.ppath.is_dir(),
            PathKind::Any => self.ppath.exists(),
        }
    }

    /// A copy of this mount with a different permission bitmap.
    pub fn with_bits(&self, bits: PathPermissionBits) -> Self {
        VirtualPath { bits, ..self.clone() }
    }

    /// Builds a new mount by appending each segment of `suffix` (already
    /// normalized, slash-separated, with no leading slash) to both the
    /// physical and virtual paths, inheriting this mount's permission bits.
    pub fn create_subpath(&self, suffix: &str, kind: PathKind) -> Self {
        debug_assert!(!suffix.starts_with('/'));
        let mut vp = self.vpath.clone();
        let mut pp = self.ppath.clone();
        for segment in super::split(suffix) {
            if vp.len() > 1 {
                vp.push('/');
            }
            vp.push_str(segment);
            pp.push(segment);
        }
        VirtualPath { vpath: vp, ppath: pp, bits: self.bits, kind }
    }

    /// Whether `self` and `other` share the same parent directory.
    ///
    /// Fixed, intentional semantics: both vpaths
    /// are split into segments; the answer is true iff both have at least
    /// one segment and every segment but the last matches pairwise. A
    /// single-segment vpath (no parent below root) never matches anything.
    pub fn is_same_parent_dir(&self, other: &str) -> bool {
        let mine = super::split(&self.vpath);
        let theirs = super::split(other);
        if mine.is_empty() || theirs.is_empty() || mine.len() != theirs.len() {
            return false;
        }
        mine[..mine.len() - 1] == theirs[..theirs.len() - 1]
    }
}

/// An ordered collection of [`VirtualPath`] mounts, indexed (conceptually)
/// by both vpath and ppath, supporting longest-prefix-with-recursive-flag
/// lookup and bottom-up merging.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    mounts: Vec<VirtualPath>,
}

/// The result of a successful [`Permissions::get_path`] lookup: the mount
/// that matched, and whatever vpath suffix remains beneath it.
pub struct Resolved<'a> {
    /// The matching mount.
    pub mount: &'a VirtualPath,
    /// The portion of the query path below `mount`, with no leading slash;
    /// empty on an exact match.
    pub remaining: String,
}

impl Permissions {
    /// An empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mount. Errors if a mount with the same vpath or the same
    /// ppath is already present.
    pub fn add_path(&mut self, path: VirtualPath) -> Result<(), EngineError> {
        if self.mounts.iter().any(|m| m.vpath == path.vpath || m.ppath == path.ppath) {
            return Err(EngineError::AlreadyExists(format!("mount collides with existing entry: {}", path.vpath)));
        }
        self.mounts.push(path);
        Ok(())
    }

    /// All mounts, in registration order.
    pub fn mounts(&self) -> &[VirtualPath] {
        &self.mounts
    }

    /// Resolves `query_vpath` to the mount that should govern it.
    ///
    /// An exact vpath match always wins. Otherwise, among mounts whose vpath
    /// is a proper prefix of the query *and* which are `IS_RECURSIVE`, the
    /// longest prefix wins. No match is [`EngineError::AccessDenied`].
    pub fn get_path(&self, query_vpath: &str) -> Result<Resolved<'_>, EngineError> {
        let mut best: Option<&VirtualPath> = None;

        for mount in &self.mounts {
            if mount.vpath == query_vpath {
                return Ok(Resolved { mount, remaining: String::new() });
            }

            let prefix_matches = query_vpath.starts_with(mount.vpath.as_str())
                && (mount.vpath == "/" || query_vpath.as_bytes().get(mount.vpath.len()) == Some(&b'/'));

            if prefix_matches && mount.bits.contains(PathPermissionBits::IS_RECURSIVE) {
                let better = match best {
                    None => true,
                    Some(b) => mount.vpath.len() > b.vpath.len(),
                };
                if better {
                    best = Some(mount);
                }
            }
        }

        let mount = best.ok_or_else(|| EngineError::AccessDenied(format!("no mount governs {query_vpath}")))?;
        let suffix_start = if mount.vpath == "/" { 1 } else { mount.vpath.len() + 1 };
        let remaining = query_vpath[suffix_start.min(query_vpath.len())..].to_string();
        Ok(Resolved { mount, remaining })
    }

    /// Resolves a vpath to its governing mount and then to a concrete
    /// physical path plus effective permission bits, normalizing against
    /// `current_dir` first.
    pub fn resolve(&self, vpath: &str, current_dir: &str) -> Result<(Ppath, PathPermissionBits), EngineError> {
        let normalized = normalize(vpath, current_dir)?;
        let resolved = self.get_path(&normalized)?;
        let ppath = if resolved.remaining.is_empty() {
            resolved.mount.ppath().to_path_buf()
        } else {
            let mut p = resolved.mount.ppath().to_path_buf();
            for segment in super::split(&resolved.remaining) {
                p.push(segment);
            }
            p
        };
        Ok((ppath, resolved.mount.bits()))
    }

    /// Absorbs every mount from `other` whose vpath *and* ppath are both
    /// absent from `self`. On any conflict the receiver's entry dominates:
    /// the foreign entry is silently skipped, never overwritten.
    pub fn merge(&mut self, other: &Permissions) {
        for mount in &other.mounts {
            let collides = self.mounts.iter().any(|m| m.vpath == mount.vpath || m.ppath == mount.ppath);
            if !collides {
                self.mounts.push(mount.clone());
            }
        }
    }

    /// Renders a vpath to a normalized form using `to_vpath`/`split` helpers
    /// purely to keep call sites terse; delegates to [`normalize`].
    pub fn normalize(vpath: &str, cwd: &str) -> Result<String, EngineError> {
        normalize(vpath, cwd)
    }
}
