//! The configuration seam: a small trait the core consumes but never
//! implements itself, plus the mount-loading routine that walks it.
//!
//! The engine does not parse TOML, YAML, environment variables, or CLI
//! flags. A caller supplies a [`ConfigTree`] over whatever format they
//! like; [`load_mounts`] is the only thing in this crate that reads one.

use crate::error::ServerError;
use crate::path::{PathKind, PathPermissionBits, Permissions, VirtualPath};

/// A slash-addressable configuration tree.
///
/// Mirrors a property-tree style configuration source: nodes are addressed
/// by path, child node names under a path are enumerable, and leaf values
/// are read with a default.
pub trait ConfigTree: Send + Sync {
    /// Lists the immediate child node names under `path`.
    fn enum_nodes(&self, path: &str) -> Vec<String>;
    /// Reads the value at `path`, or `default` if it's absent.
    fn get_value(&self, path: &str, default: &str) -> String;
}

/// Loads every mount configured under `at` (e.g. `/Users/alice/Paths`) into
/// `perms`, returning the extended set.
///
/// For each child name enumerated under `at`, reads `{at}/{name}/Name`
/// (defaulting to the child name itself), `{at}/{name}/Path` (required), and
/// `{at}/{name}/Perms` (a comma-separated [`PathPermissionBits`] literal,
/// defaulting to empty).
pub fn load_mounts(config: &dyn ConfigTree, at: &str, mut perms: Permissions) -> Result<Permissions, ServerError> {
    for alias in config.enum_nodes(at) {
        let node = format!("{}/{alias}", at.trim_end_matches('/'));
        let name = config.get_value(&format!("{node}/Name"), &alias);
        let path = config.get_value(&format!("{node}/Path"), "");
        if path.is_empty() {
            return Err(ServerError::MissingConfigValue(format!("{node}/Path")));
        }
        let perms_literal = config.get_value(&format!("{node}/Perms"), "");
        let bits = if perms_literal.is_empty() {
            PathPermissionBits::empty()
        } else {
            PathPermissionBits::parse_list(&perms_literal).map_err(|e| ServerError::InvalidMount(e.to_string()))?
        };
        let mount = VirtualPath::new(format!("/{name}"), path, bits, PathKind::Directory);
        perms.add_path(mount).map_err(|e| ServerError::InvalidMount(e.to_string()))?;
    }
    Ok(perms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// An in-memory [`ConfigTree`] for tests, keyed by full slash path.
    struct MapConfig {
        values: Mutex<HashMap<String, String>>,
        children: Mutex<HashMap<String, Vec<String>>>,
    }

    impl ConfigTree for MapConfig {
        fn enum_nodes(&self, path: &str) -> Vec<String> {
            self.children.lock().unwrap().get(path).cloned().unwrap_or_default()
        }

        fn get_value(&self, path: &str, default: &str) -> String {
            self.values.lock().unwrap().get(path).cloned().unwrap_or_else(|| default.to_string())
        }
    }

    fn config_with_one_mount() -> MapConfig {
        let mut values = HashMap::new();
        values.insert("/Paths/home/Path".to_string(), "/srv/alice".to_string());
        values.insert("/Paths/home/Perms".to_string(), "CAN_READ,CAN_LIST,IS_RECURSIVE".to_string());
        let mut children = HashMap::new();
        children.insert("/Paths".to_string(), vec!["home".to_string()]);
        MapConfig { values: Mutex::new(values), children: Mutex::new(children) }
    }

    #[test]
    fn loads_one_mount_with_parsed_permissions() {
        let config = config_with_one_mount();
        let perms = load_mounts(&config, "/Paths", Permissions::new()).unwrap();
        let resolved = perms.get_path("/home").unwrap();
        assert_eq!(resolved.mount.ppath(), std::path::Path::new("/srv/alice"));
        assert!(resolved.mount.bits().contains(PathPermissionBits::CAN_READ));
    }

    #[test]
    fn missing_path_is_an_error() {
        let mut values = HashMap::new();
        values.insert("/Paths/pub/Perms".to_string(), "CAN_LIST".to_string());
        let mut children = HashMap::new();
        children.insert("/Paths".to_string(), vec!["pub".to_string()]);
        let config = MapConfig { values: Mutex::new(values), children: Mutex::new(children) };

        assert!(load_mounts(&config, "/Paths", Permissions::new()).is_err());
    }
}
