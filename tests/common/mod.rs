//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use burrow::entity::{Entity, Tree};
use burrow::providers::{
    DeleteOutcome, FileProvider, MemoryRepository, ProviderError, ProviderInfo, ProviderResult, ProviderType,
    RepositoryProvider,
};

/// In-memory provider speaking Windows paths (`C:\dir\file`)
pub struct DriveProvider {
    info: ProviderInfo,
    /// path -> file contents (`None` for folders)
    nodes: RwLock<BTreeMap<String, Option<Vec<u8>>>>,
    listings: AtomicUsize,
}

impl DriveProvider {
    pub const ID: &'static str = "drives";

    pub fn new(drives: &[&str]) -> Self {
        let nodes = drives.iter().map(|d| (format!("{}:\\", d), None)).collect();
        Self {
            info: ProviderInfo {
                name: "Drives".to_string(),
                description: "Windows drives".to_string(),
                provider_type: ProviderType::Local,
            },
            nodes: RwLock::new(nodes),
            listings: AtomicUsize::new(0),
        }
    }

    pub fn with_folder(self, path: &str) -> Self {
        self.nodes.write().insert(path.to_string(), None);
        self
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.nodes.write().insert(path.to_string(), Some(data.to_vec()));
        self
    }

    /// Number of `list_directory` calls so far
    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.read().contains_key(path)
    }

    fn parent_of(path: &str) -> Option<String> {
        let trimmed = path.trim_end_matches('\\');
        let idx = trimmed.rfind('\\')?;
        if trimmed[..idx].ends_with(':') {
            Some(trimmed[..=idx].to_string())
        } else {
            Some(trimmed[..idx].to_string())
        }
    }

    fn entity(path: &str, data: &Option<Vec<u8>>) -> Entity {
        let name = path.trim_end_matches('\\').rsplit('\\').next().unwrap_or(path).to_string();
        let entity = match data {
            Some(bytes) => Entity::file(Self::ID, path, name).with_size(Some(bytes.len() as u64)),
            None => Entity::directory(Self::ID, path, name),
        };
        entity.with_parent(Self::parent_of(path))
    }
}

impl FileProvider for DriveProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn get_tree(&self) -> ProviderResult<Tree> {
        let drives = self
            .nodes
            .read()
            .iter()
            .filter(|(path, _)| Self::parent_of(path).is_none())
            .map(|(path, data)| Self::entity(path, data))
            .collect();
        Ok(Tree::new(self.info.name.clone(), Self::ID, drives))
    }

    fn list_directory(&self, dir: &Entity) -> ProviderResult<Vec<Entity>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let nodes = self.nodes.read();
        if !nodes.contains_key(&dir.path) {
            return Err(ProviderError::NotFound(dir.path.clone()));
        }
        Ok(nodes
            .iter()
            .filter(|(path, _)| Self::parent_of(path).as_deref() == Some(dir.path.as_str()))
            .map(|(path, data)| Self::entity(path, data))
            .collect())
    }

    fn create_directory(&self, parent_path: &str, _reference: &Entity, name: &str) -> ProviderResult<Entity> {
        let path = self.join_path(parent_path, name);
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&path) {
            return Err(ProviderError::AlreadyExists(path));
        }
        nodes.insert(path.clone(), None);
        Ok(Self::entity(&path, &None))
    }

    /// Anything named `locked*` refuses to go away
    fn delete(&self, entities: &[Arc<Entity>]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        let mut nodes = self.nodes.write();
        for entity in entities {
            if entity.name.starts_with("locked") {
                outcome.failed.push((Arc::clone(entity), ProviderError::PermissionDenied(entity.path.clone())));
            } else if nodes.remove(&entity.path).is_some() {
                outcome.succeeded.push(Arc::clone(entity));
            } else {
                outcome.failed.push((Arc::clone(entity), ProviderError::NotFound(entity.path.clone())));
            }
        }
        outcome
    }

    fn exists(&self, _parent: &Entity, candidate_path: &str) -> ProviderResult<bool> {
        Ok(self.nodes.read().contains_key(candidate_path))
    }

    fn copy(&self, source: &Entity, dest_path: &str, overwrite: bool) -> ProviderResult<Entity> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(dest_path) && !overwrite {
            return Err(ProviderError::AlreadyExists(dest_path.to_string()));
        }
        let data = nodes.get(&source.path).cloned().ok_or_else(|| ProviderError::NotFound(source.path.clone()))?;
        nodes.insert(dest_path.to_string(), data.clone());
        Ok(Self::entity(dest_path, &data))
    }

    fn read_file(&self, entity: &Entity) -> ProviderResult<Vec<u8>> {
        match self.nodes.read().get(&entity.path) {
            Some(Some(data)) => Ok(data.clone()),
            _ => Err(ProviderError::NotFound(entity.path.clone())),
        }
    }

    fn write_file(&self, _parent: &Entity, dest_path: &str, data: &[u8], overwrite: bool) -> ProviderResult<Entity> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(dest_path) && !overwrite {
            return Err(ProviderError::AlreadyExists(dest_path.to_string()));
        }
        nodes.insert(dest_path.to_string(), Some(data.to_vec()));
        Ok(Self::entity(dest_path, &Some(data.to_vec())))
    }

    fn rename(&self, entity: &Entity, new_name: &str) -> ProviderResult<Entity> {
        let parent = Self::parent_of(&entity.path).ok_or_else(|| ProviderError::NotSupported("renaming a drive".into()))?;
        let dest = self.join_path(&parent, new_name);
        let mut nodes = self.nodes.write();
        let data = nodes.remove(&entity.path).ok_or_else(|| ProviderError::NotFound(entity.path.clone()))?;
        nodes.insert(dest.clone(), data.clone());
        Ok(Self::entity(&dest, &data))
    }

    fn join_path(&self, base: &str, name: &str) -> String {
        if base.ends_with('\\') { format!("{}{}", base, name) } else { format!("{}\\{}", base, name) }
    }

    fn parent_path(&self, path: &str) -> Option<String> {
        Self::parent_of(path)
    }
}

/// `C:\Users\test\file.txt` plus a few neighbours
pub fn drives() -> Arc<DriveProvider> {
    Arc::new(
        DriveProvider::new(&["C", "D"])
            .with_folder("C:\\Us")
            .with_folder("C:\\Users")
            .with_folder("C:\\Users\\test")
            .with_file("C:\\Users\\test\\file.txt", b"hello")
            .with_file("C:\\Users\\test\\notes.txt", b"notes")
            .with_file("C:\\Users\\test\\locked.txt", b"keep"),
    )
}

pub fn repository() -> Arc<RepositoryProvider> {
    let store = MemoryRepository::new()
        .with_folder("/public/reports")
        .with_file("/public/report.ktr", b"report")
        .with_file("/public/reports/q1.ktr", b"q1")
        .with_file("/home/a.txt", b"a")
        .with_file("/home/b.txt", b"b");
    Arc::new(RepositoryProvider::new(Arc::new(store)))
}
