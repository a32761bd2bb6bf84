//! Content repository provider
//!
//! Repository objects are addressed by `/`-rooted paths and carry an object id.
//! The tree exposes a single synthetic root entry `/` that holds everything else.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{
    DeleteOutcome, FileProvider, ProviderError, ProviderInfo, ProviderResult, ProviderType, join_slash,
    parent_slash,
};
use crate::entity::{Entity, EntityDetails, EntityKind, Tree};
use crate::fs::sort_entries;
use crate::utils::last_component;

/// Metadata of one repository object
#[derive(Debug, Clone)]
pub struct RepositoryObject {
    pub object_id: String,
    /// Absolute `/`-rooted path
    pub path: String,
    pub is_folder: bool,
    pub modified: Option<SystemTime>,
    pub size: Option<u64>,
    pub read_only: bool,
}

/// Storage backend of a repository
///
/// Paths are absolute and `/`-separated; `/` is the root folder and always exists.
pub trait RepositoryStore: Send + Sync {
    /// Children of a folder
    fn list(&self, folder_path: &str) -> ProviderResult<Vec<RepositoryObject>>;

    fn stat(&self, path: &str) -> ProviderResult<Option<RepositoryObject>>;

    /// Create one folder; the parent must exist
    fn create_folder(&self, path: &str) -> ProviderResult<RepositoryObject>;

    /// Remove an object and everything below it
    fn remove(&self, object_id: &str) -> ProviderResult<()>;

    fn read(&self, path: &str) -> ProviderResult<Vec<u8>>;

    fn write(&self, path: &str, data: &[u8], overwrite: bool) -> ProviderResult<RepositoryObject>;

    /// Copy an object (recursively for folders)
    fn copy(&self, from: &str, to: &str, overwrite: bool) -> ProviderResult<RepositoryObject>;

    /// Move an object (recursively for folders), keeping object ids
    fn rename(&self, from: &str, to: &str) -> ProviderResult<RepositoryObject>;
}

#[derive(Debug, Clone)]
struct StoredObject {
    meta: RepositoryObject,
    data: Vec<u8>,
}

#[derive(Debug)]
struct MemoryInner {
    objects: BTreeMap<String, StoredObject>,
    next_id: u64,
}

impl MemoryInner {
    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:08x}", self.next_id)
    }

    fn is_folder(&self, path: &str) -> bool {
        self.objects.get(path).map(|o| o.meta.is_folder).unwrap_or(false)
    }

    /// The object at `path` and every object below it
    fn subtree(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.objects
            .keys()
            .filter(|k| k.as_str() == path || k.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn check_parent(&self, path: &str) -> ProviderResult<()> {
        let parent = parent_slash(path).ok_or_else(|| ProviderError::AlreadyExists("/".to_string()))?;
        if self.is_folder(&parent) {
            Ok(())
        } else {
            Err(ProviderError::NotFound(parent))
        }
    }

    fn insert(&mut self, path: &str, is_folder: bool, data: Vec<u8>) -> RepositoryObject {
        let meta = RepositoryObject {
            object_id: self.new_id(),
            path: path.to_string(),
            is_folder,
            modified: Some(SystemTime::now()),
            size: if is_folder { None } else { Some(data.len() as u64) },
            read_only: false,
        };
        self.objects.insert(path.to_string(), StoredObject { meta: meta.clone(), data });
        meta
    }

    fn relocate(path: &str, from: &str, to: &str) -> String {
        format!("{}{}", to, &path[from.len()..])
    }
}

/// In-process repository store
#[derive(Debug)]
pub struct MemoryRepository {
    inner: RwLock<MemoryInner>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        let mut inner = MemoryInner { objects: BTreeMap::new(), next_id: 0 };
        inner.insert("/", true, Vec::new());
        Self { inner: RwLock::new(inner) }
    }

    /// Create a folder and any missing parents
    pub fn with_folder(self, path: &str) -> Self {
        {
            let mut inner = self.inner.write();
            let mut current = String::new();
            for part in path.split('/').filter(|p| !p.is_empty()) {
                current = join_slash(if current.is_empty() { "/" } else { &current }, part);
                if !inner.objects.contains_key(&current) {
                    inner.insert(&current, true, Vec::new());
                }
            }
        }
        self
    }

    /// Create a file (and any missing parent folders)
    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        let this = match parent_slash(path) {
            Some(parent) => self.with_folder(&parent),
            None => self,
        };
        this.inner.write().insert(path, false, data.to_vec());
        this
    }
}

impl RepositoryStore for MemoryRepository {
    fn list(&self, folder_path: &str) -> ProviderResult<Vec<RepositoryObject>> {
        let inner = self.inner.read();
        if !inner.is_folder(folder_path) {
            return Err(ProviderError::NotFound(folder_path.to_string()));
        }
        Ok(inner
            .objects
            .values()
            .filter(|o| o.meta.path != "/" && parent_slash(&o.meta.path).as_deref() == Some(folder_path))
            .map(|o| o.meta.clone())
            .collect())
    }

    fn stat(&self, path: &str) -> ProviderResult<Option<RepositoryObject>> {
        Ok(self.inner.read().objects.get(path).map(|o| o.meta.clone()))
    }

    fn create_folder(&self, path: &str) -> ProviderResult<RepositoryObject> {
        let mut inner = self.inner.write();
        if inner.objects.contains_key(path) {
            return Err(ProviderError::AlreadyExists(path.to_string()));
        }
        inner.check_parent(path)?;
        Ok(inner.insert(path, true, Vec::new()))
    }

    fn remove(&self, object_id: &str) -> ProviderResult<()> {
        let mut inner = self.inner.write();
        let path = inner
            .objects
            .values()
            .find(|o| o.meta.object_id == object_id)
            .map(|o| o.meta.path.clone())
            .ok_or_else(|| ProviderError::NotFound(object_id.to_string()))?;
        if path == "/" {
            return Err(ProviderError::PermissionDenied("/".to_string()));
        }
        for key in inner.subtree(&path) {
            inner.objects.remove(&key);
        }
        Ok(())
    }

    fn read(&self, path: &str) -> ProviderResult<Vec<u8>> {
        match self.inner.read().objects.get(path) {
            Some(o) if !o.meta.is_folder => Ok(o.data.clone()),
            Some(_) => Err(ProviderError::NotSupported(format!("reading folder {}", path))),
            None => Err(ProviderError::NotFound(path.to_string())),
        }
    }

    fn write(&self, path: &str, data: &[u8], overwrite: bool) -> ProviderResult<RepositoryObject> {
        let mut inner = self.inner.write();
        inner.check_parent(path)?;
        if inner.objects.contains_key(path) {
            if !overwrite {
                return Err(ProviderError::AlreadyExists(path.to_string()));
            }
            for key in inner.subtree(path) {
                inner.objects.remove(&key);
            }
        }
        Ok(inner.insert(path, false, data.to_vec()))
    }

    fn copy(&self, from: &str, to: &str, overwrite: bool) -> ProviderResult<RepositoryObject> {
        let mut inner = self.inner.write();
        if !inner.objects.contains_key(from) {
            return Err(ProviderError::NotFound(from.to_string()));
        }
        if to == from || to.starts_with(&format!("{}/", from.trim_end_matches('/'))) {
            return Err(ProviderError::Other(format!("cannot copy {} into itself", from)));
        }
        if from.starts_with(&format!("{}/", to.trim_end_matches('/'))) {
            return Err(ProviderError::Other(format!("cannot replace {} with its own child", to)));
        }
        inner.check_parent(to)?;
        if inner.objects.contains_key(to) {
            if !overwrite {
                return Err(ProviderError::AlreadyExists(to.to_string()));
            }
            for key in inner.subtree(to) {
                inner.objects.remove(&key);
            }
        }
        let sources: Vec<StoredObject> = inner
            .subtree(from)
            .iter()
            .filter_map(|k| inner.objects.get(k).cloned())
            .collect();
        for source in sources {
            let target = MemoryInner::relocate(&source.meta.path, from, to);
            inner.insert(&target, source.meta.is_folder, source.data);
        }
        inner
            .objects
            .get(to)
            .map(|o| o.meta.clone())
            .ok_or_else(|| ProviderError::NotFound(to.to_string()))
    }

    fn rename(&self, from: &str, to: &str) -> ProviderResult<RepositoryObject> {
        let mut inner = self.inner.write();
        if !inner.objects.contains_key(from) {
            return Err(ProviderError::NotFound(from.to_string()));
        }
        if inner.objects.contains_key(to) {
            return Err(ProviderError::AlreadyExists(to.to_string()));
        }
        inner.check_parent(to)?;
        for key in inner.subtree(from) {
            if let Some(mut stored) = inner.objects.remove(&key) {
                let target = MemoryInner::relocate(&key, from, to);
                stored.meta.path = target.clone();
                inner.objects.insert(target, stored);
            }
        }
        inner
            .objects
            .get(to)
            .map(|o| o.meta.clone())
            .ok_or_else(|| ProviderError::NotFound(to.to_string()))
    }
}

/// Provider over a [`RepositoryStore`]
pub struct RepositoryProvider {
    info: ProviderInfo,
    store: Arc<dyn RepositoryStore>,
}

impl std::fmt::Debug for RepositoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryProvider").field("info", &self.info).finish()
    }
}

impl RepositoryProvider {
    pub const ID: &'static str = "repository";

    pub fn new(store: Arc<dyn RepositoryStore>) -> Self {
        Self {
            info: ProviderInfo {
                name: "Repository".to_string(),
                description: "Content repository".to_string(),
                provider_type: ProviderType::Repository,
            },
            store,
        }
    }

    fn to_entity(object: RepositoryObject) -> Entity {
        let kind = if object.is_folder { EntityKind::Folder } else { EntityKind::File };
        let root = object.path == "/";
        let name = if root { "/".to_string() } else { last_component(&object.path).to_string() };
        let entity = Entity::new(kind, Self::ID, object.path.clone(), name)
            .with_parent(parent_slash(&object.path))
            .with_modified(object.modified)
            .with_size(object.size)
            .with_details(EntityDetails::Repository { object_id: object.object_id, root });
        if object.read_only { entity.read_only() } else { entity }
    }
}

impl FileProvider for RepositoryProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn get_tree(&self) -> ProviderResult<Tree> {
        let root = self
            .store
            .stat("/")?
            .ok_or_else(|| ProviderError::Connection("repository has no root folder".to_string()))?;
        Ok(Tree::new(self.info.name.clone(), Self::ID, vec![Self::to_entity(root)]))
    }

    fn list_directory(&self, dir: &Entity) -> ProviderResult<Vec<Entity>> {
        debug!(path = %dir.path, "listing repository folder");
        let mut entries: Vec<Entity> = self.store.list(&dir.path)?.into_iter().map(Self::to_entity).collect();
        sort_entries(&mut entries);
        Ok(entries)
    }

    fn create_directory(&self, parent_path: &str, _reference: &Entity, name: &str) -> ProviderResult<Entity> {
        let path = join_slash(parent_path, name);
        self.store.create_folder(&path).map(Self::to_entity)
    }

    fn delete(&self, entities: &[Arc<Entity>]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        for entity in entities {
            let result = match entity.object_id() {
                Some(id) => self.store.remove(id),
                None => Err(ProviderError::NotFound(entity.path.clone())),
            };
            match result {
                Ok(()) => outcome.succeeded.push(Arc::clone(entity)),
                Err(e) => {
                    warn!(path = %entity.path, error = %e, "repository delete failed");
                    outcome.failed.push((Arc::clone(entity), e));
                }
            }
        }
        outcome
    }

    fn exists(&self, _parent: &Entity, candidate_path: &str) -> ProviderResult<bool> {
        Ok(self.store.stat(candidate_path)?.is_some())
    }

    fn copy(&self, source: &Entity, dest_path: &str, overwrite: bool) -> ProviderResult<Entity> {
        self.store.copy(&source.path, dest_path, overwrite).map(Self::to_entity)
    }

    fn read_file(&self, entity: &Entity) -> ProviderResult<Vec<u8>> {
        self.store.read(&entity.path)
    }

    fn write_file(&self, _parent: &Entity, dest_path: &str, data: &[u8], overwrite: bool) -> ProviderResult<Entity> {
        self.store.write(dest_path, data, overwrite).map(Self::to_entity)
    }

    fn rename(&self, entity: &Entity, new_name: &str) -> ProviderResult<Entity> {
        let parent = parent_slash(&entity.path)
            .ok_or_else(|| ProviderError::NotSupported("renaming the repository root".to_string()))?;
        self.store.rename(&entity.path, &join_slash(&parent, new_name)).map(Self::to_entity)
    }

    fn join_path(&self, base: &str, name: &str) -> String {
        join_slash(base, name)
    }

    fn parent_path(&self, path: &str) -> Option<String> {
        parent_slash(path)
    }
}
