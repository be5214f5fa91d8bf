//! In-memory `/proc` and `/sys` tree for collector tests.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::collector::traits::FileSystem;

#[derive(Debug, Clone)]
enum Node {
    File(String),
    Dir,
    /// Any access fails with this kind.
    Broken(io::ErrorKind),
}

/// In-memory filesystem.
///
/// Inserting a node creates its missing ancestors as directories. A node can
/// be marked broken to simulate permission problems on a single path.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    nodes: BTreeMap<PathBuf, Node>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.insert(path.as_ref(), Node::File(content.into()));
    }

    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), Node::Dir);
    }

    /// Replaces whatever is at `path` with a node every access to which
    /// fails with `kind`.
    pub fn fail_with(&mut self, path: impl AsRef<Path>, kind: io::ErrorKind) {
        self.insert(path.as_ref(), Node::Broken(kind));
    }

    fn insert(&mut self, path: &Path, node: Node) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
        self.nodes.insert(path.to_path_buf(), node);
    }

    fn lookup(&self, path: &Path) -> io::Result<&Node> {
        match self.nodes.get(path) {
            Some(Node::Broken(kind)) => Err(io::Error::new(
                *kind,
                format!("injected failure: {}", path.display()),
            )),
            Some(node) => Ok(node),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such path: {}", path.display()),
            )),
        }
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.lookup(path)? {
            Node::File(content) => Ok(content.clone()),
            _ => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            )),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        match self.lookup(path)? {
            Node::Dir => Ok(self
                .nodes
                .keys()
                .filter(|p| p.parent() == Some(path))
                .cloned()
                .collect()),
            _ => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", path.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestors_become_dirs() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/bonding/bond0", "Bonding Mode: active-backup\n");

        for dir in ["/", "/proc", "/proc/net", "/proc/net/bonding"] {
            assert!(fs.exists(Path::new(dir)), "{}", dir);
        }
        assert_eq!(
            fs.read_to_string(Path::new("/proc/net/bonding/bond0")).unwrap(),
            "Bonding Mode: active-backup\n"
        );
    }

    #[test]
    fn test_read_dir_lists_direct_children() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/bonding/bond0", "");
        fs.add_file("/proc/net/bonding/bond1", "");
        fs.add_file("/proc/net/snmp", "");
        fs.add_dir("/proc/net/stat");

        let net = fs.read_dir(Path::new("/proc/net")).unwrap();
        assert_eq!(
            net,
            vec![
                PathBuf::from("/proc/net/bonding"),
                PathBuf::from("/proc/net/snmp"),
                PathBuf::from("/proc/net/stat"),
            ]
        );
        assert!(fs.read_dir(Path::new("/proc/net/stat")).unwrap().is_empty());
    }

    #[test]
    fn test_kind_mismatch_and_missing() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/diskstats", "");

        let err = fs.read_to_string(Path::new("/proc/stat")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(fs.read_to_string(Path::new("/proc")).is_err());
        assert!(fs.read_dir(Path::new("/proc/diskstats")).is_err());
    }

    #[test]
    fn test_broken_path() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/snmp", "Tcp: RtoMin\n");
        fs.fail_with("/proc/net/snmp", io::ErrorKind::PermissionDenied);

        let err = fs.read_to_string(Path::new("/proc/net/snmp")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(fs.exists(Path::new("/proc/net/snmp")));
    }
}
