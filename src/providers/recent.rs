//! Recent files pseudo-provider
//!
//! Keeps the files confirmed in earlier sessions, most recent first, and
//! persists them as TOML next to the configuration.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DeleteOutcome, FileProvider, ProviderError, ProviderInfo, ProviderResult, ProviderType, join_slash};
use crate::entity::{Entity, EntityDetails, Tree};

/// One remembered file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    /// Provider the file was opened from
    pub provider: String,
    /// Match path inside that provider
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Seconds since the Unix epoch
    #[serde(default)]
    pub opened_at: u64,
}

impl RecentEntry {
    fn from_entity(entity: &Entity) -> Self {
        let provider = entity.origin_provider().to_string();
        let opened_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            provider,
            path: entity.match_path().to_string(),
            name: entity.name.clone(),
            connection: entity.connection().map(str::to_string),
            object_id: entity.object_id().map(str::to_string),
            opened_at,
        }
    }

    fn to_entity(&self) -> Entity {
        Entity::file(RecentProvider::ID, self.path.clone(), self.name.clone())
            .with_modified(Some(UNIX_EPOCH + Duration::from_secs(self.opened_at)))
            .with_details(EntityDetails::Recent {
                origin_provider: self.provider.clone(),
                connection: self.connection.clone(),
                object_id: self.object_id.clone(),
            })
            .read_only()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecentFile {
    #[serde(default)]
    recent: Vec<RecentEntry>,
}

/// Provider listing recently confirmed files
#[derive(Debug)]
pub struct RecentProvider {
    info: ProviderInfo,
    /// Backing TOML file; `None` keeps entries in memory only
    store: Option<PathBuf>,
    limit: usize,
    entries: RwLock<Vec<RecentEntry>>,
}

impl RecentProvider {
    pub const ID: &'static str = "recents";

    /// Load entries from `store` (missing or unreadable files start empty)
    pub fn new(store: Option<PathBuf>, limit: usize) -> Self {
        let mut entries = store.as_ref().map(|path| Self::load(path)).unwrap_or_default();
        entries.truncate(limit);
        Self {
            info: ProviderInfo {
                name: "Recent".to_string(),
                description: "Recently opened files".to_string(),
                provider_type: ProviderType::Recent,
            },
            store,
            limit,
            entries: RwLock::new(entries),
        }
    }

    pub fn in_memory(limit: usize) -> Self {
        Self::new(None, limit)
    }

    fn load(path: &PathBuf) -> Vec<RecentEntry> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        match toml_edit::de::from_str::<RecentFile>(&content) {
            Ok(file) => file.recent,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable recent files store");
                Vec::new()
            }
        }
    }

    fn save(&self, entries: &[RecentEntry]) {
        let Some(path) = &self.store else {
            return;
        };
        if let Some(dir) = path.parent()
            && let Err(e) = fs::create_dir_all(dir)
        {
            warn!(path = %dir.display(), error = %e, "could not create recent files directory");
            return;
        }
        let file = RecentFile { recent: entries.to_vec() };
        match toml_edit::ser::to_string_pretty(&file) {
            Ok(content) => {
                if let Err(e) = fs::write(path, content) {
                    warn!(path = %path.display(), error = %e, "could not save recent files");
                }
            }
            Err(e) => warn!(error = %e, "could not serialize recent files"),
        }
    }

    /// Put `entity` at the front, dropping older duplicates and the overflow
    pub fn record(&self, entity: &Entity) {
        if entity.is_dir() {
            return;
        }
        let entry = RecentEntry::from_entity(entity);
        debug!(provider = %entry.provider, path = %entry.path, "recording recent file");
        let mut entries = self.entries.write();
        entries.retain(|e| !(e.provider == entry.provider && e.path == entry.path));
        entries.insert(0, entry);
        entries.truncate(self.limit);
        self.save(&entries);
    }

    pub fn entries(&self) -> Vec<RecentEntry> {
        self.entries.read().clone()
    }

    /// Remove an entry; returns whether it was present
    pub fn forget(&self, origin_provider: &str, path: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| !(e.provider == origin_provider && e.path == path));
        let removed = entries.len() != before;
        if removed {
            self.save(&entries);
        }
        removed
    }

    fn not_supported(what: &str) -> ProviderError {
        ProviderError::NotSupported(format!("{} in recent files", what))
    }
}

impl FileProvider for RecentProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn get_tree(&self) -> ProviderResult<Tree> {
        let children = self.entries.read().iter().map(RecentEntry::to_entity).collect();
        Ok(Tree::new(self.info.name.clone(), Self::ID, children))
    }

    fn list_directory(&self, dir: &Entity) -> ProviderResult<Vec<Entity>> {
        Err(ProviderError::NotFound(dir.path.clone()))
    }

    fn create_directory(&self, _parent_path: &str, _reference: &Entity, _name: &str) -> ProviderResult<Entity> {
        Err(Self::not_supported("creating folders"))
    }

    fn delete(&self, entities: &[Arc<Entity>]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        for entity in entities {
            if self.forget(entity.origin_provider(), &entity.path) {
                outcome.succeeded.push(Arc::clone(entity));
            } else {
                outcome.failed.push((Arc::clone(entity), ProviderError::NotFound(entity.path.clone())));
            }
        }
        outcome
    }

    fn exists(&self, _parent: &Entity, candidate_path: &str) -> ProviderResult<bool> {
        Ok(self.entries.read().iter().any(|e| e.path == candidate_path))
    }

    fn copy(&self, _source: &Entity, _dest_path: &str, _overwrite: bool) -> ProviderResult<Entity> {
        Err(Self::not_supported("copying"))
    }

    fn read_file(&self, _entity: &Entity) -> ProviderResult<Vec<u8>> {
        Err(Self::not_supported("reading"))
    }

    fn write_file(&self, _parent: &Entity, _dest_path: &str, _data: &[u8], _overwrite: bool) -> ProviderResult<Entity> {
        Err(Self::not_supported("writing"))
    }

    fn rename(&self, _entity: &Entity, _new_name: &str) -> ProviderResult<Entity> {
        Err(Self::not_supported("renaming"))
    }

    fn join_path(&self, base: &str, name: &str) -> String {
        join_slash(base, name)
    }

    fn parent_path(&self, _path: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(provider: &str, path: &str) -> Entity {
        let name = path.rsplit('/').next().unwrap_or(path);
        Entity::file(provider, path, name)
    }

    #[test]
    fn test_most_recent_first_and_bounded() {
        let recents = RecentProvider::in_memory(2);
        recents.record(&file("local", "/a.csv"));
        recents.record(&file("local", "/b.csv"));
        recents.record(&file("local", "/a.csv"));
        recents.record(&file("repository", "/c.ktr"));

        let paths: Vec<String> = recents.entries().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["/c.ktr", "/a.csv"]);
    }

    #[test]
    fn test_folders_are_not_recorded() {
        let recents = RecentProvider::in_memory(5);
        recents.record(&Entity::directory("local", "/tmp", "tmp"));
        assert!(recents.entries().is_empty());
    }

    #[test]
    fn test_delete_forgets_entry() {
        let recents = RecentProvider::in_memory(5);
        recents.record(&file("local", "/a.csv"));
        let tree = recents.get_tree().unwrap();
        let outcome = recents.delete(&tree.children);
        assert_eq!(outcome.succeeded.len(), 1);
        assert!(recents.entries().is_empty());
        assert!(recents.get_tree().unwrap().children.is_empty());
    }

    #[test]
    fn test_persisted_between_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let store = tmp.path().join("recent.toml");
        RecentProvider::new(Some(store.clone()), 5).record(&file("local", "/a.csv"));

        let reopened = RecentProvider::new(Some(store), 5);
        let entries = reopened.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].provider, "local");
    }

    #[test]
    fn test_unwritable_store_keeps_entries_in_memory() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let recents = RecentProvider::new(Some(blocker.join("recent.toml")), 5);
        recents.record(&file("local", "/a.csv"));
        assert_eq!(recents.entries().len(), 1);
        assert!(!blocker.join("recent.toml").exists());
    }

    #[test]
    fn test_mutations_not_supported() {
        let recents = RecentProvider::in_memory(5);
        let f = file("local", "/a.csv");
        assert!(matches!(recents.copy(&f, "/b.csv", false), Err(ProviderError::NotSupported(_))));
        assert!(matches!(recents.create_directory("/", &f, "x"), Err(ProviderError::NotSupported(_))));
    }
}
