//! In-process VFS backend

use std::collections::BTreeMap;
use std::time::SystemTime;

use parking_lot::RwLock;

use super::{VfsBackend, VfsStat};
use crate::providers::{ProviderError, ProviderResult, parent_slash};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Stored {
    node: Node,
    modified: SystemTime,
}

/// Backend keeping a whole tree in memory, keyed by absolute path
#[derive(Debug)]
pub struct MemoryBackend {
    nodes: RwLock<BTreeMap<String, Stored>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Stored { node: Node::Dir, modified: SystemTime::now() });
        Self { nodes: RwLock::new(nodes) }
    }

    fn to_stat(path: &str, stored: &Stored) -> VfsStat {
        let (is_dir, size) = match &stored.node {
            Node::Dir => (true, None),
            Node::File(data) => (false, Some(data.len() as u64)),
        };
        VfsStat { path: path.to_string(), is_dir, size, modified: Some(stored.modified) }
    }

    fn require_parent_dir(nodes: &BTreeMap<String, Stored>, path: &str) -> ProviderResult<()> {
        let parent = parent_slash(path).ok_or_else(|| ProviderError::AlreadyExists(path.to_string()))?;
        match nodes.get(&parent) {
            Some(Stored { node: Node::Dir, .. }) => Ok(()),
            Some(_) => Err(ProviderError::Other(format!("{} is not a directory", parent))),
            None => Err(ProviderError::NotFound(parent)),
        }
    }

    fn is_below(path: &str, dir: &str) -> bool {
        dir == "/" || path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
    }
}

impl VfsBackend for MemoryBackend {
    fn list(&self, path: &str) -> ProviderResult<Vec<VfsStat>> {
        let nodes = self.nodes.read();
        match nodes.get(path) {
            Some(Stored { node: Node::Dir, .. }) => {}
            Some(_) => return Err(ProviderError::Other(format!("{} is not a directory", path))),
            None => return Err(ProviderError::NotFound(path.to_string())),
        }
        Ok(nodes
            .iter()
            .filter(|(p, _)| p.as_str() != "/" && parent_slash(p).as_deref() == Some(path))
            .map(|(p, s)| Self::to_stat(p, s))
            .collect())
    }

    fn stat(&self, path: &str) -> ProviderResult<Option<VfsStat>> {
        Ok(self.nodes.read().get(path).map(|s| Self::to_stat(path, s)))
    }

    fn mkdir(&self, path: &str) -> ProviderResult<()> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(path) {
            return Err(ProviderError::AlreadyExists(path.to_string()));
        }
        Self::require_parent_dir(&nodes, path)?;
        nodes.insert(path.to_string(), Stored { node: Node::Dir, modified: SystemTime::now() });
        Ok(())
    }

    fn remove(&self, path: &str) -> ProviderResult<()> {
        if path == "/" {
            return Err(ProviderError::PermissionDenied(path.to_string()));
        }
        let mut nodes = self.nodes.write();
        if nodes.remove(path).is_none() {
            return Err(ProviderError::NotFound(path.to_string()));
        }
        nodes.retain(|p, _| !Self::is_below(p, path));
        Ok(())
    }

    fn read(&self, path: &str) -> ProviderResult<Vec<u8>> {
        match self.nodes.read().get(path) {
            Some(Stored { node: Node::File(data), .. }) => Ok(data.clone()),
            Some(_) => Err(ProviderError::Other(format!("{} is a directory", path))),
            None => Err(ProviderError::NotFound(path.to_string())),
        }
    }

    fn write(&self, path: &str, data: &[u8]) -> ProviderResult<()> {
        let mut nodes = self.nodes.write();
        if let Some(Stored { node: Node::Dir, .. }) = nodes.get(path) {
            return Err(ProviderError::AlreadyExists(path.to_string()));
        }
        Self::require_parent_dir(&nodes, path)?;
        nodes.insert(
            path.to_string(),
            Stored { node: Node::File(data.to_vec()), modified: SystemTime::now() },
        );
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> ProviderResult<()> {
        let mut nodes = self.nodes.write();
        if !nodes.contains_key(from) {
            return Err(ProviderError::NotFound(from.to_string()));
        }
        if nodes.contains_key(to) {
            return Err(ProviderError::AlreadyExists(to.to_string()));
        }
        Self::require_parent_dir(&nodes, to)?;
        let moved: Vec<String> = nodes
            .keys()
            .filter(|p| p.as_str() == from || Self::is_below(p, from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(stored) = nodes.remove(&old) {
                let new = format!("{}{}", to, &old[from.len()..]);
                nodes.insert(new, stored);
            }
        }
        Ok(())
    }
}
