//! VFS connection provider
//!
//! Every configured connection shows up as one top-level directory. Entities
//! carry two paths: `path` is the backend's own `/`-rooted path and the
//! connection path is `pvfs://<connection><path>`, which is what callers,
//! the resolver and the cache see.

mod memory;
mod sftp;

pub use memory::MemoryBackend;
pub use sftp::{SftpAuth, SftpBackend, SftpConnectionInfo};

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, warn};

use super::{
    DeleteOutcome, FileProvider, ProviderError, ProviderInfo, ProviderResult, ProviderType, join_slash,
    parent_slash,
};
use crate::config::SavedConnection;
use crate::entity::{Entity, EntityDetails, EntityKind, Tree};
use crate::fs::sort_entries;
use crate::utils::last_component;

/// URL scheme of connection paths
pub const VFS_SCHEME: &str = "pvfs";

/// Stat of one backend object
#[derive(Debug, Clone)]
pub struct VfsStat {
    /// Absolute `/`-rooted backend path
    pub path: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
}

/// Storage behind one VFS connection. Paths are absolute and `/`-rooted.
pub trait VfsBackend: Send + Sync {
    fn list(&self, path: &str) -> ProviderResult<Vec<VfsStat>>;

    fn stat(&self, path: &str) -> ProviderResult<Option<VfsStat>>;

    fn mkdir(&self, path: &str) -> ProviderResult<()>;

    /// Remove a file, or a directory with everything below it
    fn remove(&self, path: &str) -> ProviderResult<()>;

    fn read(&self, path: &str) -> ProviderResult<Vec<u8>>;

    /// Create or truncate a file
    fn write(&self, path: &str, data: &[u8]) -> ProviderResult<()>;

    fn rename(&self, from: &str, to: &str) -> ProviderResult<()>;

    /// Copy within the backend; read-and-write by default
    fn copy(&self, from: &str, to: &str) -> ProviderResult<()> {
        copy_tree(self, from, self, to)
    }

    /// Drop cached sessions/handles
    fn disconnect(&self) {}
}

/// Copy `from` (file or directory) on `src` to `to` on `dst`
pub fn copy_tree<S, D>(src: &S, from: &str, dst: &D, to: &str) -> ProviderResult<()>
where
    S: VfsBackend + ?Sized,
    D: VfsBackend + ?Sized,
{
    let stat = src.stat(from)?.ok_or_else(|| ProviderError::NotFound(from.to_string()))?;
    if !stat.is_dir {
        return dst.write(to, &src.read(from)?);
    }
    dst.mkdir(to)?;
    for child in src.list(from)? {
        let name = last_component(&child.path);
        copy_tree(src, &child.path, dst, &join_slash(to, name))?;
    }
    Ok(())
}

/// `path` is `ancestor` or lies below it (both `/`-rooted backend paths)
fn is_same_or_below(path: &str, ancestor: &str) -> bool {
    let ancestor = ancestor.trim_end_matches('/');
    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// A named connection and its backend
#[derive(Clone)]
pub struct VfsConnection {
    pub name: String,
    pub backend: Arc<dyn VfsBackend>,
}

impl VfsConnection {
    pub fn new(name: impl Into<String>, backend: Arc<dyn VfsBackend>) -> Self {
        Self { name: name.into(), backend }
    }
}

/// `pvfs://box` + `/data` -> `pvfs://box/data`
pub fn connection_path(connection: &str, path: &str) -> String {
    format!("{}://{}{}", VFS_SCHEME, connection, if path.is_empty() { "/" } else { path })
}

/// `pvfs://box/data` -> ("box", "/data"); the connection root maps to "/"
pub fn split_connection_path(url: &str) -> Option<(&str, String)> {
    let rest = url.strip_prefix(VFS_SCHEME)?.strip_prefix("://")?;
    let (connection, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    if connection.is_empty() {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    Some((connection, if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }))
}

/// Provider over the configured VFS connections
pub struct VfsProvider {
    info: ProviderInfo,
    connections: Vec<VfsConnection>,
}

impl std::fmt::Debug for VfsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VfsProvider")
            .field("connections", &self.connections.iter().map(|c| &c.name).collect::<Vec<_>>())
            .finish()
    }
}

impl VfsProvider {
    pub const ID: &'static str = "vfs";

    pub fn new(connections: Vec<VfsConnection>) -> Self {
        Self {
            info: ProviderInfo {
                name: "VFS Connections".to_string(),
                description: "Virtual filesystem connections".to_string(),
                provider_type: ProviderType::Vfs,
            },
            connections,
        }
    }

    /// Build connections from saved configuration; unknown kinds are skipped
    pub fn from_config(saved: &[SavedConnection]) -> Self {
        let mut connections = Vec::new();
        for conn in saved {
            let backend: Arc<dyn VfsBackend> = match conn.kind.as_str() {
                "memory" => Arc::new(MemoryBackend::new()),
                "sftp" => Arc::new(SftpBackend::new(SftpConnectionInfo::from_saved(conn))),
                other => {
                    warn!(connection = %conn.name, kind = other, "unknown connection kind, skipping");
                    continue;
                }
            };
            connections.push(VfsConnection::new(conn.name.clone(), backend));
        }
        Self::new(connections)
    }

    fn backend(&self, connection: &str) -> ProviderResult<&Arc<dyn VfsBackend>> {
        self.connections
            .iter()
            .find(|c| c.name == connection)
            .map(|c| &c.backend)
            .ok_or_else(|| ProviderError::NotFound(connection_path(connection, "/")))
    }

    /// Resolve a connection path to its backend and backend path
    fn locate(&self, url: &str) -> ProviderResult<(&str, &Arc<dyn VfsBackend>, String)> {
        let (connection, path) =
            split_connection_path(url).ok_or_else(|| ProviderError::NotFound(url.to_string()))?;
        let conn = self
            .connections
            .iter()
            .find(|c| c.name == connection)
            .ok_or_else(|| ProviderError::NotFound(url.to_string()))?;
        Ok((conn.name.as_str(), &conn.backend, path))
    }

    fn to_entity(connection: &str, stat: VfsStat) -> Entity {
        let kind = if stat.is_dir { EntityKind::Folder } else { EntityKind::File };
        let parent = parent_slash(&stat.path);
        let details = EntityDetails::Vfs {
            connection: connection.to_string(),
            connection_path: connection_path(connection, &stat.path),
            connection_parent_path: parent.as_deref().map(|p| connection_path(connection, p)),
        };
        Entity::new(kind, Self::ID, stat.path.clone(), last_component(&stat.path))
            .with_parent(parent)
            .with_modified(stat.modified)
            .with_size(stat.size)
            .with_details(details)
    }

    fn connection_root(connection: &str) -> Entity {
        Entity::directory(Self::ID, "/", connection).with_details(EntityDetails::Vfs {
            connection: connection.to_string(),
            connection_path: connection_path(connection, "/"),
            connection_parent_path: None,
        })
    }

    fn stat_entity(&self, url: &str) -> ProviderResult<Entity> {
        let (connection, backend, path) = self.locate(url)?;
        let stat = backend.stat(&path)?.ok_or_else(|| ProviderError::NotFound(url.to_string()))?;
        Ok(Self::to_entity(connection, stat))
    }

    /// Make room at `path`, refusing collisions unless `overwrite`
    fn prepare_destination(backend: &dyn VfsBackend, path: &str, url: &str, overwrite: bool) -> ProviderResult<()> {
        if backend.stat(path)?.is_none() {
            return Ok(());
        }
        if !overwrite {
            return Err(ProviderError::AlreadyExists(url.to_string()));
        }
        backend.remove(path)
    }
}

impl FileProvider for VfsProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn get_tree(&self) -> ProviderResult<Tree> {
        let children = self.connections.iter().map(|c| Self::connection_root(&c.name)).collect();
        Ok(Tree::new(self.info.name.clone(), Self::ID, children))
    }

    fn list_directory(&self, dir: &Entity) -> ProviderResult<Vec<Entity>> {
        let connection = dir
            .connection()
            .ok_or_else(|| ProviderError::NotFound(dir.match_path().to_string()))?;
        debug!(connection, path = %dir.path, "listing vfs directory");
        let backend = self.backend(connection)?;
        let mut entries: Vec<Entity> = backend
            .list(&dir.path)?
            .into_iter()
            .map(|stat| Self::to_entity(connection, stat))
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }

    fn create_directory(&self, parent_path: &str, _reference: &Entity, name: &str) -> ProviderResult<Entity> {
        let url = join_slash(parent_path, name);
        let (_, backend, path) = self.locate(&url)?;
        if backend.stat(&path)?.is_some() {
            return Err(ProviderError::AlreadyExists(url));
        }
        backend.mkdir(&path)?;
        self.stat_entity(&url)
    }

    fn delete(&self, entities: &[Arc<Entity>]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        for entity in entities {
            let result = if entity.path == "/" {
                Err(ProviderError::PermissionDenied(entity.match_path().to_string()))
            } else {
                self.locate(entity.match_path()).and_then(|(_, backend, path)| backend.remove(&path))
            };
            match result {
                Ok(()) => outcome.succeeded.push(Arc::clone(entity)),
                Err(e) => {
                    warn!(path = %entity.match_path(), error = %e, "vfs delete failed");
                    outcome.failed.push((Arc::clone(entity), e));
                }
            }
        }
        outcome
    }

    fn exists(&self, _parent: &Entity, candidate_path: &str) -> ProviderResult<bool> {
        let (_, backend, path) = self.locate(candidate_path)?;
        Ok(backend.stat(&path)?.is_some())
    }

    fn copy(&self, source: &Entity, dest_path: &str, overwrite: bool) -> ProviderResult<Entity> {
        let (src_conn, src_backend, src_path) = self.locate(source.match_path())?;
        let (dst_conn, dst_backend, dst_path) = self.locate(dest_path)?;

        if src_conn == dst_conn {
            if source.is_dir() && is_same_or_below(&dst_path, &src_path) {
                return Err(ProviderError::Other(format!("cannot copy {} into itself", source.match_path())));
            }
            // overwriting the source or one of its ancestors would delete the source first
            if is_same_or_below(&src_path, &dst_path) {
                return Err(ProviderError::Other(format!("cannot copy {} over {}", source.match_path(), dest_path)));
            }
        }

        Self::prepare_destination(dst_backend.as_ref(), &dst_path, dest_path, overwrite)?;
        if src_conn == dst_conn {
            src_backend.copy(&src_path, &dst_path)?;
        } else {
            copy_tree(src_backend.as_ref(), &src_path, dst_backend.as_ref(), &dst_path)?;
        }
        self.stat_entity(dest_path)
    }

    fn read_file(&self, entity: &Entity) -> ProviderResult<Vec<u8>> {
        let (_, backend, path) = self.locate(entity.match_path())?;
        backend.read(&path)
    }

    fn write_file(&self, _parent: &Entity, dest_path: &str, data: &[u8], overwrite: bool) -> ProviderResult<Entity> {
        let (_, backend, path) = self.locate(dest_path)?;
        Self::prepare_destination(backend.as_ref(), &path, dest_path, overwrite)?;
        backend.write(&path, data)?;
        self.stat_entity(dest_path)
    }

    fn rename(&self, entity: &Entity, new_name: &str) -> ProviderResult<Entity> {
        let parent = entity
            .match_parent()
            .ok_or_else(|| ProviderError::NotSupported("renaming a connection".to_string()))?;
        let target = join_slash(parent, new_name);
        let (_, backend, from) = self.locate(entity.match_path())?;
        let (_, _, to) = self.locate(&target)?;
        if backend.stat(&to)?.is_some() {
            return Err(ProviderError::AlreadyExists(target));
        }
        backend.rename(&from, &to)?;
        self.stat_entity(&target)
    }

    fn join_path(&self, base: &str, name: &str) -> String {
        join_slash(base, name)
    }

    fn parent_path(&self, path: &str) -> Option<String> {
        let (connection, backend_path) = split_connection_path(path)?;
        parent_slash(&backend_path).map(|p| connection_path(connection, &p))
    }

    fn clear_provider_cache(&self) {
        for conn in &self.connections {
            conn.backend.disconnect();
        }
    }
}
