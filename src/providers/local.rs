//! Local filesystem provider

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{DeleteOutcome, FileProvider, ProviderError, ProviderInfo, ProviderResult, ProviderType};
use crate::entity::{Entity, Tree};
use crate::fs::utils::{copy_path, delete_path, is_within};
use crate::fs::{entity_from_path, path_string, read_directory};

/// Provider for local filesystem operations
#[derive(Debug)]
pub struct LocalProvider {
    info: ProviderInfo,
    /// Top-level directories shown under the tree
    roots: Vec<PathBuf>,
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalProvider {
    pub const ID: &'static str = "local";

    /// Create a local provider rooted at `/` (Unix) or at every drive (Windows)
    pub fn new() -> Self {
        #[cfg(windows)]
        let roots = crate::utils::get_available_drives()
            .into_iter()
            .map(|d| PathBuf::from(format!("{}\\", d)))
            .collect();
        #[cfg(not(windows))]
        let roots = vec![PathBuf::from("/")];

        Self::with_roots(roots)
    }

    /// Create a local provider showing only the given directories at the top level
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self {
            info: ProviderInfo {
                name: "Local".to_string(),
                description: "Local filesystem".to_string(),
                provider_type: ProviderType::Local,
            },
            roots,
        }
    }

    fn entity(path: &Path) -> ProviderResult<Entity> {
        entity_from_path(Self::ID, path).map_err(|e| ProviderError::from_io(e, &path_string(path)))
    }

    /// Clear the way for an overwrite, refusing collisions otherwise
    fn prepare_destination(dest: &Path, overwrite: bool) -> ProviderResult<()> {
        if fs::symlink_metadata(dest).is_err() {
            return Ok(());
        }
        if !overwrite {
            return Err(ProviderError::AlreadyExists(path_string(dest)));
        }
        delete_path(dest).map_err(|e| ProviderError::from_io(e, &path_string(dest)))
    }
}

impl FileProvider for LocalProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn get_tree(&self) -> ProviderResult<Tree> {
        let mut children = Vec::new();
        for root in &self.roots {
            match Self::entity(root) {
                Ok(entity) if entity.is_dir() => children.push(entity),
                Ok(_) => warn!(root = %root.display(), "local root is not a directory"),
                Err(e) => warn!(root = %root.display(), error = %e, "local root unavailable"),
            }
        }
        Ok(Tree::new(self.info.name.clone(), Self::ID, children))
    }

    fn list_directory(&self, dir: &Entity) -> ProviderResult<Vec<Entity>> {
        debug!(path = %dir.path, "listing local directory");
        read_directory(Self::ID, Path::new(&dir.path)).map_err(|e| ProviderError::from_io(e, &dir.path))
    }

    fn create_directory(&self, parent_path: &str, _reference: &Entity, name: &str) -> ProviderResult<Entity> {
        let path = Path::new(parent_path).join(name);
        if fs::symlink_metadata(&path).is_ok() {
            return Err(ProviderError::AlreadyExists(path_string(&path)));
        }
        fs::create_dir(&path).map_err(|e| ProviderError::from_io(e, &path_string(&path)))?;
        Self::entity(&path)
    }

    fn delete(&self, entities: &[Arc<Entity>]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        for entity in entities {
            match delete_path(Path::new(&entity.path)) {
                Ok(()) => outcome.succeeded.push(Arc::clone(entity)),
                Err(e) => {
                    warn!(path = %entity.path, error = %e, "local delete failed");
                    outcome.failed.push((Arc::clone(entity), ProviderError::from_io(e, &entity.path)));
                }
            }
        }
        outcome
    }

    fn exists(&self, _parent: &Entity, candidate_path: &str) -> ProviderResult<bool> {
        Ok(fs::symlink_metadata(candidate_path).is_ok())
    }

    fn copy(&self, source: &Entity, dest_path: &str, overwrite: bool) -> ProviderResult<Entity> {
        let src = Path::new(&source.path);
        let dest = Path::new(dest_path);
        if src.is_dir() && is_within(dest, src) {
            return Err(ProviderError::Other(format!(
                "cannot copy {} into itself",
                source.path
            )));
        }
        // overwriting the source or one of its ancestors would delete the source first
        if is_within(src, dest) {
            return Err(ProviderError::Other(format!(
                "cannot copy {} over {}",
                source.path, dest_path
            )));
        }
        Self::prepare_destination(dest, overwrite)?;
        copy_path(src, dest).map_err(|e| ProviderError::from_io(e, dest_path))?;
        Self::entity(dest)
    }

    fn read_file(&self, entity: &Entity) -> ProviderResult<Vec<u8>> {
        fs::read(&entity.path).map_err(|e| ProviderError::from_io(e, &entity.path))
    }

    fn write_file(&self, _parent: &Entity, dest_path: &str, data: &[u8], overwrite: bool) -> ProviderResult<Entity> {
        let dest = Path::new(dest_path);
        Self::prepare_destination(dest, overwrite)?;
        fs::write(dest, data).map_err(|e| ProviderError::from_io(e, dest_path))?;
        Self::entity(dest)
    }

    fn rename(&self, entity: &Entity, new_name: &str) -> ProviderResult<Entity> {
        let from = Path::new(&entity.path);
        let to = match from.parent() {
            Some(parent) => parent.join(new_name),
            None => return Err(ProviderError::NotSupported(format!("renaming {}", entity.path))),
        };
        if fs::symlink_metadata(&to).is_ok() {
            return Err(ProviderError::AlreadyExists(path_string(&to)));
        }
        fs::rename(from, &to).map_err(|e| ProviderError::from_io(e, &entity.path))?;
        Self::entity(&to)
    }

    fn join_path(&self, base: &str, name: &str) -> String {
        path_string(&Path::new(base).join(name))
    }

    fn parent_path(&self, path: &str) -> Option<String> {
        Path::new(path).parent().map(path_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_at(root: &Path) -> (LocalProvider, Entity) {
        let provider = LocalProvider::with_roots(vec![root.to_path_buf()]);
        let root_entity = provider.get_tree().unwrap().children[0].as_ref().clone();
        (provider, root_entity)
    }

    #[test]
    fn test_tree_and_listing_order() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.txt"), b"b").unwrap();
        std::fs::write(tmp.path().join("A.txt"), b"a").unwrap();
        std::fs::create_dir(tmp.path().join("zeta")).unwrap();

        let (provider, root) = provider_at(tmp.path());
        let names: Vec<String> = provider.list_directory(&root).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["zeta", "A.txt", "b.txt"]);
    }

    #[test]
    fn test_create_directory_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let (provider, root) = provider_at(tmp.path());

        let created = provider.create_directory(&root.path, &root, "new").unwrap();
        assert!(created.is_dir());
        assert_eq!(created.parent.as_deref(), Some(root.path.as_str()));

        let again = provider.create_directory(&root.path, &root, "new");
        assert!(matches!(again, Err(ProviderError::AlreadyExists(_))));
    }

    #[test]
    fn test_unique_name_and_copy() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"one").unwrap();
        std::fs::write(tmp.path().join("a (1).txt"), b"two").unwrap();
        let (provider, root) = provider_at(tmp.path());

        let candidate = provider.join_path(&root.path, "a.txt");
        let unique = provider.unique_name(&root, &candidate).unwrap();
        assert!(unique.ends_with("a (2).txt"));

        let source = provider.list_directory(&root).unwrap().into_iter().find(|e| e.name == "a.txt").unwrap();
        assert!(matches!(provider.copy(&source, &provider.join_path(&root.path, "a (1).txt"), false), Err(ProviderError::AlreadyExists(_))));

        let copied = provider.copy(&source, &unique, false).unwrap();
        assert_eq!(std::fs::read(&copied.path).unwrap(), b"one");
    }

    #[test]
    fn test_delete_reports_per_item() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("keep.txt"), b"x").unwrap();
        let (provider, root) = provider_at(tmp.path());

        let present = Arc::new(provider.list_directory(&root).unwrap().remove(0));
        let missing = Arc::new(Entity::file(LocalProvider::ID, path_string(&tmp.path().join("gone.txt")), "gone.txt"));

        let outcome = provider.delete(&[present, missing]);
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert!(!tmp.path().join("keep.txt").exists());
    }

    #[test]
    fn test_copy_over_own_ancestor_refused() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("reports").join("reports")).unwrap();
        std::fs::write(tmp.path().join("reports").join("reports").join("q1.csv"), b"q1").unwrap();
        std::fs::write(tmp.path().join("reports").join("keep.txt"), b"keep").unwrap();
        let (provider, root) = provider_at(tmp.path());

        let outer = provider.list_directory(&root).unwrap().remove(0);
        let inner = provider.list_directory(&outer).unwrap().into_iter().find(|e| e.is_dir()).unwrap();
        let result = provider.copy(&inner, &outer.path, true);
        assert!(matches!(result, Err(ProviderError::Other(_))));
        assert!(tmp.path().join("reports").join("keep.txt").exists());
        assert!(tmp.path().join("reports").join("reports").join("q1.csv").exists());

        let file = provider.list_directory(&outer).unwrap().into_iter().find(|e| e.name == "keep.txt").unwrap();
        assert!(provider.copy(&file, &file.path, true).is_err());
        assert_eq!(std::fs::read(tmp.path().join("reports").join("keep.txt")).unwrap(), b"keep");
    }
}
