//! File providers for the different storage backends
//!
//! Providers abstract storage operations so the navigation core can work with:
//! - Local filesystems
//! - A content repository (object ids, single `/` root)
//! - VFS connections (`pvfs://connection/path`)
//! - The recent-files pseudo-provider

mod local;
mod recent;
pub mod registry;
mod repository;
pub mod vfs;

pub use local::LocalProvider;
pub use recent::{RecentEntry, RecentProvider};
pub use registry::{ALL_PROVIDERS, ProviderRegistry};
pub use repository::{MemoryRepository, RepositoryObject, RepositoryProvider, RepositoryStore};
pub use vfs::{VfsBackend, VfsConnection, VfsProvider};

use std::sync::Arc;

use thiserror::Error;

use crate::entity::{Entity, Tree};
use crate::utils::numbered_name;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Map an I/O error on `path`, keeping the not-found/exists cases distinguishable
    pub fn from_io(e: std::io::Error, path: &str) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => ProviderError::NotFound(path.to_string()),
            std::io::ErrorKind::AlreadyExists => ProviderError::AlreadyExists(path.to_string()),
            std::io::ErrorKind::PermissionDenied => ProviderError::PermissionDenied(path.to_string()),
            _ => ProviderError::Io(e),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Type of provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Local,
    Repository,
    Vfs,
    Recent,
}

/// Information about a provider for display by the host
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Display name (e.g., "Local", "Repository")
    pub name: String,
    /// Short description
    pub description: String,
    pub provider_type: ProviderType,
}

/// Result of a provider-level delete: per-item, never all-or-nothing
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    pub succeeded: Vec<Arc<Entity>>,
    pub failed: Vec<(Arc<Entity>, ProviderError)>,
}

/// Uniform backend contract
///
/// Every call may block on backend I/O. Implementors guard their own mutable
/// state; the navigation core only ever holds shared references.
pub trait FileProvider: Send + Sync {
    /// Registry key (e.g., "local", "repository")
    fn id(&self) -> &str;

    fn info(&self) -> &ProviderInfo;

    /// Build the root node of this provider
    fn get_tree(&self) -> ProviderResult<Tree>;

    /// List a directory's children, unfiltered and uncached
    fn list_directory(&self, dir: &Entity) -> ProviderResult<Vec<Entity>>;

    /// Create `name` inside `parent_path`.
    ///
    /// `reference` is the parent entity as listed, for providers that need
    /// more than the path (connection, object id). Fails with
    /// [`ProviderError::AlreadyExists`] on a name collision.
    fn create_directory(&self, parent_path: &str, reference: &Entity, name: &str) -> ProviderResult<Entity>;

    /// Delete each entity independently, reporting which ones went away
    fn delete(&self, entities: &[Arc<Entity>]) -> DeleteOutcome;

    /// Whether `candidate_path` exists inside `parent`
    fn exists(&self, parent: &Entity, candidate_path: &str) -> ProviderResult<bool>;

    /// A path inside `parent` derived from `candidate_path` that does not exist yet
    fn unique_name(&self, parent: &Entity, candidate_path: &str) -> ProviderResult<String> {
        let base = crate::utils::last_component(candidate_path).to_string();
        for n in 1..10_000 {
            let candidate = self.join_path(parent.match_path(), &numbered_name(&base, n));
            if !self.exists(parent, &candidate)? {
                return Ok(candidate);
            }
        }
        Err(ProviderError::Other(format!("no free name for {}", candidate_path)))
    }

    /// Copy `source` (same provider) to `dest_path`, replacing it when `overwrite`
    fn copy(&self, source: &Entity, dest_path: &str, overwrite: bool) -> ProviderResult<Entity>;

    /// Read a file's bytes (cross-provider transfers)
    fn read_file(&self, entity: &Entity) -> ProviderResult<Vec<u8>>;

    /// Write bytes to `dest_path` inside `parent` (cross-provider transfers)
    fn write_file(&self, parent: &Entity, dest_path: &str, data: &[u8], overwrite: bool) -> ProviderResult<Entity>;

    /// Rename an entity within its directory
    fn rename(&self, entity: &Entity, new_name: &str) -> ProviderResult<Entity>;

    /// Join a child name onto a directory path in this provider's grammar
    fn join_path(&self, base: &str, name: &str) -> String;

    /// Parent path in this provider's grammar
    fn parent_path(&self, path: &str) -> Option<String>;

    /// Drop any backend-side caches (no-op by default)
    fn clear_provider_cache(&self) {}
}

/// Join with `/`, the grammar of every non-local provider
pub(crate) fn join_slash(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Parent of a `/`-separated path; the parent of a top-level entry is "/"
pub(crate) fn parent_slash(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        Some("/".to_string())
    } else {
        Some(trimmed[..idx].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_slash() {
        assert_eq!(join_slash("/", "public"), "/public");
        assert_eq!(join_slash("/public", "a.ktr"), "/public/a.ktr");
        assert_eq!(join_slash("pvfs://box/", "data"), "pvfs://box/data");
    }

    #[test]
    fn test_parent_slash() {
        assert_eq!(parent_slash("/public/a.ktr").as_deref(), Some("/public"));
        assert_eq!(parent_slash("/public").as_deref(), Some("/"));
        assert_eq!(parent_slash("/"), None);
    }
}
