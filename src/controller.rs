//! File controller: the service object tying the provider registry to the
//! listing cache and the per-provider tree snapshots.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::cache::FileCache;
use crate::entity::{Entity, Listing, Node, Tree};
use crate::errors::{NavError, NavResult};
use crate::filter::FileFilter;
use crate::providers::{DeleteOutcome, FileProvider, ProviderRegistry};
use crate::utils::last_component;

pub struct FileController {
    registry: ProviderRegistry,
    cache: Arc<FileCache>,
    /// One tree per registered provider, in registration order
    trees: RwLock<Vec<Arc<Tree>>>,
}

impl std::fmt::Debug for FileController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileController")
            .field("registry", &self.registry)
            .field("cached_listings", &self.cache.len())
            .finish()
    }
}

impl FileController {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self::with_cache(registry, Arc::new(FileCache::new()))
    }

    /// Build the controller around an existing (possibly shared) cache
    pub fn with_cache(registry: ProviderRegistry, cache: Arc<FileCache>) -> Self {
        let trees = registry.iter().map(|p| Arc::new(Self::build_tree(p.as_ref()))).collect();
        Self { registry, cache, trees: RwLock::new(trees) }
    }

    fn build_tree(provider: &dyn FileProvider) -> Tree {
        match provider.get_tree() {
            Ok(tree) => {
                debug!(provider = provider.id(), children = tree.children.len(), "built provider tree");
                tree
            }
            Err(e) => {
                warn!(provider = provider.id(), error = %e, "provider tree unavailable");
                Tree::new(provider.info().name.clone(), provider.id(), Vec::new())
            }
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    pub fn provider(&self, id: &str) -> NavResult<&Arc<dyn FileProvider>> {
        self.registry.get(id)
    }

    /// Trees of the providers selected by `provider_filter` (an id or "all")
    pub fn load(&self, provider_filter: &str) -> NavResult<Vec<Arc<Tree>>> {
        let selected = self.registry.select(provider_filter)?;
        let trees = self.trees.read();
        Ok(selected
            .into_iter()
            .filter_map(|p| trees.iter().find(|t| t.provider == p.id()).cloned())
            .collect())
    }

    pub fn tree(&self, provider: &str) -> NavResult<Arc<Tree>> {
        self.trees
            .read()
            .iter()
            .find(|t| t.provider == provider)
            .cloned()
            .ok_or_else(|| NavError::InvalidFileProvider(provider.to_string()))
    }

    /// Rebuild one provider's tree from the provider
    pub fn reload_tree(&self, provider: &str) -> NavResult<Arc<Tree>> {
        let p = self.registry.get(provider)?;
        let tree = Arc::new(Self::build_tree(p.as_ref()));
        let mut trees = self.trees.write();
        match trees.iter_mut().find(|t| t.provider == provider) {
            Some(slot) => *slot = Arc::clone(&tree),
            None => trees.push(Arc::clone(&tree)),
        }
        Ok(tree)
    }

    /// Unfiltered children of `dir`, from the cache when allowed.
    /// A bypassed cache is refilled with the fresh listing.
    fn fetch(&self, dir: &Entity, use_cache: bool) -> NavResult<Listing> {
        let key = dir.match_path();
        if use_cache && let Some(listing) = self.cache.get(&dir.provider, key) {
            return Ok(listing);
        }
        let provider = self.registry.get(&dir.provider)?;
        let children = provider.list_directory(dir)?;
        debug!(provider = %dir.provider, path = key, count = children.len(), "fetched listing");
        Ok(self.cache.put(&dir.provider, key, children.into_iter().map(Arc::new).collect()))
    }

    /// Children of `dir` that pass `filter`.
    ///
    /// With the pass-everything filter the cached snapshot itself is returned,
    /// so repeated cached calls hand back the same `Arc`.
    pub fn get_files(&self, dir: &Entity, filter: &FileFilter, use_cache: bool) -> NavResult<Listing> {
        if !dir.is_dir() {
            return Err(NavError::InvalidSelection(format!("{} is not a folder", dir.match_path())));
        }
        let listing = self.fetch(dir, use_cache)?;
        Ok(apply_filter(listing, filter))
    }

    /// Children of any node; a tree's children come from its snapshot
    pub fn children(&self, node: &Node, filter: &FileFilter, use_cache: bool) -> NavResult<Listing> {
        match node {
            Node::Tree(tree) => Ok(apply_filter(Arc::new(tree.children.clone()), filter)),
            Node::Entity(entity) => self.get_files(entity, filter, use_cache),
        }
    }

    /// Re-list `dir` bypassing the cache
    pub fn refresh(&self, dir: &Entity) -> NavResult<Listing> {
        self.cache.invalidate(&dir.provider, dir.match_path());
        self.fetch(dir, false)
    }

    pub fn invalidate(&self, provider: &str, path: &str) {
        self.cache.invalidate(provider, path);
    }

    /// Invalidate the listing that contains `entity`
    pub fn invalidate_parent(&self, entity: &Entity) {
        if let Some(parent) = entity.match_parent() {
            self.cache.invalidate(&entity.provider, parent);
        }
    }

    /// Create a folder inside `parent` and invalidate the parent listing
    pub fn add_folder(&self, parent: &Entity, name: &str) -> NavResult<Arc<Entity>> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(NavError::InvalidSelection(format!("invalid folder name '{}'", name)));
        }
        if !parent.is_dir() || !parent.can_add_children {
            return Err(NavError::NotSupported(format!("creating folders in {}", parent.match_path())));
        }
        let provider = self.registry.get(&parent.provider)?;
        let created = provider.create_directory(parent.match_path(), parent, name)?;
        info!(provider = %parent.provider, path = created.match_path(), "created folder");
        self.cache.invalidate(&parent.provider, parent.match_path());
        Ok(Arc::new(created))
    }

    pub fn exists(&self, parent: &Entity, candidate_path: &str) -> NavResult<bool> {
        Ok(self.registry.get(&parent.provider)?.exists(parent, candidate_path)?)
    }

    pub fn unique_name(&self, parent: &Entity, candidate_path: &str) -> NavResult<String> {
        Ok(self.registry.get(&parent.provider)?.unique_name(parent, candidate_path)?)
    }

    /// Path of `name` inside `dir`, in the grammar of `dir`'s provider
    pub fn join_path(&self, dir: &Entity, name: &str) -> NavResult<String> {
        Ok(self.registry.get(&dir.provider)?.join_path(dir.match_path(), name))
    }

    /// Copy `source` to `dest_path` inside `dest_dir`.
    ///
    /// Same provider: the provider's own copy. Across providers: bytes are
    /// read from the source and written to the destination, folders are
    /// recreated and filled child by child.
    pub fn copy_entity(
        &self,
        source: &Entity,
        dest_dir: &Entity,
        dest_path: &str,
        overwrite: bool,
    ) -> NavResult<Arc<Entity>> {
        let src = self.registry.get(&source.provider)?;
        let dst = self.registry.get(&dest_dir.provider)?;
        let copied = if source.provider == dest_dir.provider {
            src.copy(source, dest_path, overwrite)?
        } else {
            self.transfer(src.as_ref(), source, dst.as_ref(), dest_dir, dest_path, overwrite)?
        };
        debug!(from = source.match_path(), to = copied.match_path(), overwrite, "copied");
        Ok(Arc::new(copied))
    }

    fn transfer(
        &self,
        src: &dyn FileProvider,
        source: &Entity,
        dst: &dyn FileProvider,
        dest_dir: &Entity,
        dest_path: &str,
        overwrite: bool,
    ) -> NavResult<Entity> {
        if !source.is_dir() {
            let data = src.read_file(source)?;
            return Ok(dst.write_file(dest_dir, dest_path, &data, overwrite)?);
        }

        if dst.exists(dest_dir, dest_path)? {
            if !overwrite {
                return Err(NavError::NameConflict(dest_path.to_string()));
            }
            self.remove_existing(dst, dest_dir, dest_path)?;
        }

        let created = dst.create_directory(dest_dir.match_path(), dest_dir, last_component(dest_path))?;
        for child in src.list_directory(source)? {
            let child_dest = dst.join_path(created.match_path(), &child.name);
            self.transfer(src, &child, dst, &created, &child_dest, false)?;
        }
        Ok(created)
    }

    /// Delete whatever sits at `path` inside `dir` so it can be replaced
    fn remove_existing(&self, provider: &dyn FileProvider, dir: &Entity, path: &str) -> NavResult<()> {
        let existing = provider
            .list_directory(dir)?
            .into_iter()
            .find(|e| e.match_path() == path)
            .ok_or_else(|| NavError::PathNotFound(path.to_string()))?;
        let outcome = provider.delete(&[Arc::new(existing)]);
        match outcome.failed.into_iter().next() {
            Some((_, e)) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Rename within the parent directory and invalidate the parent listing
    pub fn rename(&self, entity: &Entity, new_name: &str) -> NavResult<Arc<Entity>> {
        let new_name = new_name.trim();
        if new_name.is_empty() || new_name.contains(['/', '\\']) {
            return Err(NavError::InvalidSelection(format!("invalid name '{}'", new_name)));
        }
        if !entity.can_edit {
            return Err(NavError::NotSupported(format!("renaming {}", entity.match_path())));
        }
        let provider = self.registry.get(&entity.provider)?;
        let renamed = provider.rename(entity, new_name)?;
        self.invalidate_parent(entity);
        if entity.is_dir() {
            self.cache.invalidate(&entity.provider, entity.match_path());
        }
        Ok(Arc::new(renamed))
    }

    /// Provider-level delete of a same-provider batch; cache untouched
    pub fn delete(&self, provider: &str, entities: &[Arc<Entity>]) -> NavResult<DeleteOutcome> {
        Ok(self.registry.get(provider)?.delete(entities))
    }

    /// Drop cached listings of one provider and let the provider drop its own caches
    pub fn clear_cache(&self, provider: &str) -> NavResult<()> {
        let p = self.registry.get(provider)?;
        self.cache.clear_provider(provider);
        p.clear_provider_cache();
        Ok(())
    }
}

fn apply_filter(listing: Listing, filter: &FileFilter) -> Listing {
    if filter.is_all() {
        return listing;
    }
    Arc::new(listing.iter().filter(|e| filter.accepts(e)).cloned().collect())
}
