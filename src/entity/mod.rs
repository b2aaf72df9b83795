//! Entity tree (component L): `Server → Host → Protocol → Interface`, with
//! bottom-up effective-permission rollup.
//!
//! Parent→child links are owning (`Arc`); child→parent back-references are
//! `Weak`, so the tree can never form an ownership cycle — the same pattern
//! the session/session-manager relationship uses (see `server::session`).

use crate::path::Permissions;
use std::sync::{Arc, RwLock, Weak};

/// A node in the entity tree. Every level (`Server`, `Host`, `Protocol`,
/// `Interface`) is represented by the same type; the distinction is purely
/// where in the tree it sits.
pub struct Entity {
    name: String,
    parent: RwLock<Weak<Entity>>,
    children: RwLock<Vec<Arc<Entity>>>,
    local_permissions: RwLock<Permissions>,
}

impl Entity {
    /// Creates a new, parentless entity (a `Server` root).
    pub fn root(name: impl Into<String>) -> Arc<Entity> {
        Arc::new(Entity { name: name.into(), parent: RwLock::new(Weak::new()), children: RwLock::new(Vec::new()), local_permissions: RwLock::new(Permissions::new()) })
    }

    /// Creates a new child of `parent` and attaches it.
    pub fn child_of(parent: &Arc<Entity>, name: impl Into<String>) -> Arc<Entity> {
        let child = Arc::new(Entity {
            name: name.into(),
            parent: RwLock::new(Arc::downgrade(parent)),
            children: RwLock::new(Vec::new()),
            local_permissions: RwLock::new(Permissions::new()),
        });
        parent.children.write().expect("entity tree lock poisoned").push(child.clone());
        child
    }

    /// This entity's name (`Name`/`LongName` in the configuration tree).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A strong reference to this entity's parent, if it has one and it is
    /// still alive.
    pub fn parent(&self) -> Option<Arc<Entity>> {
        self.parent.read().expect("entity tree lock poisoned").upgrade()
    }

    /// This entity's own (non-inherited) permission mounts.
    pub fn local_permissions(&self) -> Permissions {
        self.local_permissions.read().expect("entity tree lock poisoned").clone()
    }

    /// Replaces this entity's local permission mounts.
    pub fn set_local_permissions(&self, perms: Permissions) {
        *self.local_permissions.write().expect("entity tree lock poisoned") = perms;
    }

    /// This entity's immediate children.
    pub fn children(&self) -> Vec<Arc<Entity>> {
        self.children.read().expect("entity tree lock poisoned").clone()
    }

    /// Returns a copy of this entity's local permissions merged (per
    /// `Permissions::merge`'s receiver-dominates rule) with every ancestor's
    /// local permissions, visited bottom-up: this node's mounts win on any
    /// vpath/ppath collision, then its parent's, and so on up to the root.
    pub fn effective_permissions(&self) -> Permissions {
        let mut effective = self.local_permissions();
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            effective.merge(&node.local_permissions());
            cursor = node.parent();
        }
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{default_permissions, PathKind, VirtualPath};

    #[test]
    fn effective_permissions_roll_up_bottom_first() {
        let server = Entity::root("server");
        let host = Entity::child_of(&server, "host1");
        let protocol = Entity::child_of(&host, "ftp");

        let mut server_perms = Permissions::new();
        server_perms.add_path(VirtualPath::new("/", "/srv", default_permissions(), PathKind::Directory)).unwrap();
        server.set_local_permissions(server_perms);

        let mut protocol_perms = Permissions::new();
        protocol_perms.add_path(VirtualPath::new("/home", "/srv/home", default_permissions(), PathKind::Directory)).unwrap();
        protocol.set_local_permissions(protocol_perms);

        let effective = protocol.effective_permissions();
        assert!(effective.get_path("/home/alice").is_ok());
        assert!(effective.get_path("/anything").is_ok()); // covered by server's recursive root mount
    }

    #[test]
    fn child_local_mount_dominates_on_conflict() {
        let server = Entity::root("server");
        let host = Entity::child_of(&server, "host1");

        let mut server_perms = Permissions::new();
        server_perms.add_path(VirtualPath::new("/pub", "/srv/pub", crate::path::PathPermissionBits::empty(), PathKind::Directory)).unwrap();
        server.set_local_permissions(server_perms);

        let mut host_perms = Permissions::new();
        host_perms.add_path(VirtualPath::new("/pub", "/other/pub", default_permissions(), PathKind::Directory)).unwrap();
        host.set_local_permissions(host_perms);

        let effective = host.effective_permissions();
        let resolved = effective.get_path("/pub").unwrap();
        assert_eq!(resolved.mount.ppath(), std::path::Path::new("/other/pub"));
    }

    #[test]
    fn parent_link_does_not_leak_via_child() {
        let server = Entity::root("server");
        let host = Entity::child_of(&server, "host1");
        assert!(host.parent().is_some());
        drop(server);
        // The Weak parent pointer does not keep the root alive once the
        // only strong owner is dropped.
        assert!(host.parent().is_none());
    }
}
