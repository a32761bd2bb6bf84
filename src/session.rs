//! Navigation session: one open/save operation from request to result
//!
//! The session owns the per-operation state (history, selection, clipboard,
//! paste engine, active filter) and drives the shared [`FileController`].
//! Nothing here renders anything; a front end calls these operations and
//! shows what they return.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::canonical_path;
use crate::clipboard::Clipboard;
use crate::config::Config;
use crate::controller::FileController;
use crate::delete::{DeleteReport, delete_batch};
use crate::entity::{Entity, Listing, Node, Tree};
use crate::errors::{NavError, NavResult};
use crate::filter::{FileFilter, FilterSet};
use crate::history::{NavigationHistory, SelectionEvent};
use crate::paste::{ConflictResolver, PasteEngine, PasteReport};
use crate::providers::vfs::{VFS_SCHEME, connection_path};
use crate::providers::{ALL_PROVIDERS, RecentProvider, VfsProvider};
use crate::resolver::PathResolver;
use crate::selection::{FileDetails, OperationMode, SelectionState};

/// What the caller wants from the session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationRequest {
    pub command: OperationMode,
    /// Location to pre-select
    pub initial_path: Option<String>,
    /// Provider to show and to resolve `initial_path` in; all providers when unset
    pub provider: Option<String>,
    /// VFS connection `initial_path` is relative to
    pub connection: Option<String>,
    /// Comma separated filter ids to offer
    pub filter: Option<String>,
    /// Filter active at start
    pub default_filter: Option<String>,
    /// Extension appended to a typed save name that has none
    pub file_type: Option<String>,
}

/// What the session hands back; every field unset on cancel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub confirmed: bool,
    #[serde(flatten)]
    pub details: FileDetails,
}

pub struct NavigationSession {
    controller: Arc<FileController>,
    request: OperationRequest,
    config: Config,
    history: NavigationHistory,
    selection: SelectionState,
    clipboard: Clipboard,
    paste: PasteEngine,
    filters: FilterSet,
    active_filter: FileFilter,
    search: Option<String>,
    recents: Option<Arc<RecentProvider>>,
}

impl NavigationSession {
    pub fn new(controller: Arc<FileController>, config: Config, request: OperationRequest) -> Self {
        let history = NavigationHistory::new(config.general.history_limit);
        let selection = SelectionState::new(request.command);
        let mut session = Self {
            controller,
            config,
            history,
            selection,
            clipboard: Clipboard::new(),
            paste: PasteEngine::new(),
            filters: FilterSet::default(),
            active_filter: FileFilter::all(),
            search: None,
            recents: None,
            request,
        };
        session.set_filters(FilterSet::bundled());
        session
    }

    /// Offer `filters`, narrowed by the request's filter list
    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.set_filters(filters);
        self
    }

    /// Recent-files provider to record confirmed files in (the instance registered with the controller)
    pub fn with_recents(mut self, recents: Arc<RecentProvider>) -> Self {
        self.recents = Some(recents);
        self
    }

    fn set_filters(&mut self, filters: FilterSet) {
        self.filters = filters.restrict(self.request.filter.as_deref().unwrap_or_default());
        self.active_filter = self
            .request
            .default_filter
            .as_deref()
            .and_then(|id| self.filters.get(id))
            .unwrap_or_else(|| self.filters.first())
            .clone();
    }

    pub fn controller(&self) -> &Arc<FileController> {
        &self.controller
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn paste_engine(&self) -> &PasteEngine {
        &self.paste
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn active_filter(&self) -> &FileFilter {
        &self.active_filter
    }

    /// Load the trees and pre-select the requested (or remembered) location.
    ///
    /// Pre-selection is best effort: an unknown provider or a path that no
    /// longer exists leaves nothing selected.
    pub fn open(&mut self) -> NavResult<Vec<Arc<Tree>>> {
        let provider_filter = self.request.provider.clone().unwrap_or_else(|| ALL_PROVIDERS.to_string());
        let trees = match self.controller.load(&provider_filter) {
            Ok(trees) => trees,
            Err(NavError::InvalidFileProvider(id)) => {
                debug!(provider = %id, "requested provider not registered, showing all");
                self.controller.load(ALL_PROVIDERS)?
            }
            Err(e) => return Err(e),
        };

        let target = match self.request.initial_path.clone().filter(|p| !p.is_empty()) {
            Some(path) => Some((self.request.provider.clone(), self.request_path(path))),
            None if self.config.general.remember_path => self
                .config
                .general
                .last_path
                .clone()
                .map(|path| (self.config.general.last_provider.clone(), path)),
            None => None,
        };

        if let Some((provider, path)) = target {
            match self.resolve(provider.as_deref(), &path) {
                Ok(entity) => self.show_resolved(entity, provider.as_deref()),
                Err(e) => debug!(path = %path, error = %e, "pre-selection skipped"),
            }
        }
        info!(mode = %self.request.command, trees = trees.len(), "session opened");
        Ok(trees)
    }

    /// A VFS initial path relative to the requested connection becomes a connection path
    fn request_path(&self, path: String) -> String {
        match (&self.request.connection, self.request.provider.as_deref()) {
            (Some(connection), Some(VfsProvider::ID)) if !path.starts_with(VFS_SCHEME) => {
                let rel = if path.starts_with('/') { path } else { format!("/{}", path) };
                connection_path(connection, &rel)
            }
            _ => path,
        }
    }

    /// Resolve in one provider, or in every tree until one matches
    fn resolve(&self, provider: Option<&str>, path: &str) -> NavResult<Arc<Entity>> {
        let resolver = PathResolver::new(&self.controller);
        if let Some(provider) = provider {
            return Ok(resolver.resolve_in(provider, path)?.entity);
        }
        let mut last_err = NavError::PathNotFound(path.to_string());
        for tree in self.controller.load(ALL_PROVIDERS)? {
            if tree.provider == RecentProvider::ID {
                continue;
            }
            match resolver.resolve(&tree, path) {
                Ok(resolution) => return Ok(resolution.entity),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Select a resolved entity: directories in the tree, files in the list of their parent
    fn show_resolved(&mut self, entity: Arc<Entity>, provider: Option<&str>) {
        if entity.is_dir() {
            self.select(Node::Entity(entity));
            return;
        }
        let parent = entity
            .match_parent()
            .and_then(|parent| self.resolve(provider.or(Some(entity.provider.as_str())), parent).ok())
            .filter(|dir| dir.is_dir());
        match parent {
            Some(dir) => self.select(Node::Entity(dir)),
            None => {
                if let Ok(tree) = self.controller.tree(&entity.provider) {
                    self.select(Node::Tree(tree));
                }
            }
        }
        self.selection.select_list(vec![entity]);
    }

    /// User selection in the navigation pane
    pub fn select(&mut self, node: Node) {
        self.apply(SelectionEvent::User(node));
    }

    fn apply(&mut self, event: SelectionEvent) {
        self.history.observe(&event);
        self.selection.select_tree(event.node().clone());
        self.search = None;
    }

    /// User selection in the listing pane
    pub fn select_in_list(&mut self, entities: Vec<Arc<Entity>>) {
        self.selection.select_list(entities);
    }

    /// Jump to a typed path; on failure the selection stays where it was
    pub fn navigate_to(&mut self, path: &str) -> NavResult<Arc<Entity>> {
        let path = path.trim();
        let current_provider = self.current_node().map(|n| n.provider().to_string());
        let entity = match current_provider.as_deref() {
            Some(provider) => match self.resolve(Some(provider), path) {
                Ok(entity) => entity,
                Err(e) if e.is_not_found() => self.resolve(None, path)?,
                Err(e) => return Err(e),
            },
            None => self.resolve(None, path)?,
        };
        let provider = entity.provider.clone();
        self.show_resolved(Arc::clone(&entity), Some(&provider));
        Ok(entity)
    }

    pub fn back(&mut self) -> Option<Node> {
        let node = self.history.back()?;
        self.apply(SelectionEvent::History(node.clone()));
        Some(node)
    }

    pub fn forward(&mut self) -> Option<Node> {
        let node = self.history.forward()?;
        self.apply(SelectionEvent::History(node.clone()));
        Some(node)
    }

    /// Select the parent directory, or the provider tree from a top-level directory
    pub fn up(&mut self) -> NavResult<Node> {
        let current = self
            .current_node()
            .ok_or_else(|| NavError::InvalidSelection("nothing selected".to_string()))?;
        let Node::Entity(entity) = current else {
            return Ok(current);
        };

        let parent = entity.match_parent().and_then(|parent| {
            let resolved = PathResolver::new(&self.controller).resolve_in(&entity.provider, parent).ok()?;
            (canonical_path(resolved.entity.match_path()) == canonical_path(parent)).then_some(resolved.entity)
        });
        let node = match parent {
            Some(dir) => Node::Entity(dir),
            None => Node::Tree(self.controller.tree(&entity.provider)?),
        };
        self.select(node.clone());
        Ok(node)
    }

    /// Node whose children the listing pane shows
    pub fn current_node(&self) -> Option<Node> {
        self.selection.tree_selection().cloned()
    }

    fn current_dir(&self) -> NavResult<Arc<Entity>> {
        match self.current_node() {
            Some(Node::Entity(entity)) if entity.is_dir() => Ok(entity),
            Some(_) => Err(NavError::NotSupported("this operation at the top of a provider".to_string())),
            None => Err(NavError::InvalidSelection("no folder selected".to_string())),
        }
    }

    /// Re-read the current directory (or rebuild the current tree), bypassing the cache
    pub fn refresh(&mut self) -> NavResult<Listing> {
        match self.current_node() {
            Some(Node::Entity(dir)) => {
                self.controller.refresh(&dir)?;
            }
            Some(Node::Tree(tree)) => {
                let rebuilt = self.controller.reload_tree(&tree.provider)?;
                self.selection.select_tree(Node::Tree(rebuilt));
            }
            None => return Err(NavError::InvalidSelection("nothing selected".to_string())),
        }
        self.current_listing()
    }

    /// Children of the current node under the active filter and search
    pub fn current_listing(&self) -> NavResult<Listing> {
        let node = self
            .current_node()
            .ok_or_else(|| NavError::InvalidSelection("nothing selected".to_string()))?;
        let listing = self.controller.children(&node, &self.active_filter, true)?;
        Ok(match &self.search {
            Some(query) => {
                let query = query.to_lowercase();
                Arc::new(listing.iter().filter(|e| e.name.to_lowercase().contains(&query)).cloned().collect())
            }
            None => listing,
        })
    }

    /// Narrow the current listing to names containing `query` (case-insensitive)
    pub fn search(&mut self, query: &str) -> NavResult<Listing> {
        let query = query.trim();
        self.search = (!query.is_empty()).then(|| query.to_string());
        self.current_listing()
    }

    pub fn set_filter(&mut self, id: &str) -> NavResult<()> {
        let filter = self
            .filters
            .get(id)
            .ok_or_else(|| NavError::InvalidSelection(format!("unknown filter '{}'", id)))?;
        self.active_filter = filter.clone();
        Ok(())
    }

    pub fn set_file_name(&mut self, name: &str) {
        self.selection.set_file_name(name);
    }

    /// Create a folder in the current directory and select it in the listing
    pub fn add_folder(&mut self, name: &str) -> NavResult<Arc<Entity>> {
        let dir = self.current_dir()?;
        let created = self.controller.add_folder(&dir, name)?;
        self.selection.select_list(vec![Arc::clone(&created)]);
        Ok(created)
    }

    pub fn rename_selected(&mut self, new_name: &str) -> NavResult<Arc<Entity>> {
        let [entity] = self.selection.list_selection() else {
            return Err(NavError::InvalidSelection("select exactly one item to rename".to_string()));
        };
        let renamed = self.controller.rename(entity, new_name)?;
        self.selection.select_list(vec![Arc::clone(&renamed)]);
        Ok(renamed)
    }

    /// Delete the listing selection; the listing is refreshed whatever the outcome
    pub fn delete_selected(&mut self) -> NavResult<DeleteReport> {
        let selection = self.selection.list_selection().to_vec();
        let parent_dir = self.current_dir().ok();
        let result = delete_batch(&self.controller, &selection, parent_dir.as_deref());
        if result.is_ok() || matches!(result, Err(NavError::DeleteFailed { .. })) {
            self.selection.clear_list();
            if let Some(Node::Tree(tree)) = self.current_node() {
                let rebuilt = self.controller.reload_tree(&tree.provider)?;
                self.selection.select_tree(Node::Tree(rebuilt));
            }
        }
        result
    }

    pub fn copy_selected(&mut self) -> NavResult<usize> {
        let items = self.clipboard_items()?;
        let count = items.len();
        self.clipboard.copy(items);
        Ok(count)
    }

    pub fn cut_selected(&mut self) -> NavResult<usize> {
        let items = self.clipboard_items()?;
        let count = items.len();
        self.clipboard.cut(items);
        Ok(count)
    }

    fn clipboard_items(&self) -> NavResult<Vec<Arc<Entity>>> {
        let items = self.selection.list_selection().to_vec();
        if items.is_empty() {
            return Err(NavError::InvalidSelection("nothing selected".to_string()));
        }
        Ok(items)
    }

    /// Paste the clipboard into the current directory
    pub fn paste(&mut self, resolver: &mut dyn ConflictResolver) -> NavResult<PasteReport> {
        if self.clipboard.is_empty() {
            return Err(NavError::InvalidSelection("clipboard is empty".to_string()));
        }
        let dir = self.current_dir()?;
        self.paste.paste_clipboard(&self.controller, &mut self.clipboard, &dir, resolver)
    }

    pub fn details(&self) -> FileDetails {
        let mut details = self.selection.derive(&self.active_filter);
        if self.selection.mode().is_save()
            && let (Some(name), Some(ext)) = (details.name.as_mut(), self.request.file_type.as_deref())
        {
            let ext = ext.trim_start_matches('.');
            if !ext.is_empty() && !name.contains('.') {
                name.push('.');
                name.push_str(ext);
            }
        }
        details
    }

    pub fn can_confirm(&self) -> bool {
        self.selection.can_confirm(&self.details())
    }

    /// Finish the operation with the current selection.
    ///
    /// An opened file is recorded in the recent files; the location is
    /// remembered for the next session when `remember_path` is on.
    pub fn confirm(&mut self) -> NavResult<OperationResult> {
        let details = self.details();
        if !self.selection.can_confirm(&details) {
            return Err(NavError::InvalidSelection(format!(
                "nothing to {} in the current selection",
                self.selection.mode()
            )));
        }

        if !self.selection.mode().is_save()
            && let Some(recents) = &self.recents
            && let Some(Node::Entity(entity)) = self.selection.focused()
            && !entity.is_dir()
        {
            recents.record(&entity);
            self.controller.reload_tree(RecentProvider::ID)?;
        }

        if let (Some(provider), Some(path)) = (&details.provider, &details.path)
            && self.config.remember_location(provider, path)
            && let Err(e) = self.config.persist()
        {
            warn!(error = %e, "could not save the remembered location");
        }

        info!(path = ?details.path, name = ?details.name, "operation confirmed");
        Ok(OperationResult { confirmed: true, details })
    }

    /// Abandon the operation: every result field unset
    pub fn cancel(&mut self) -> OperationResult {
        self.clipboard.clear();
        OperationResult::default()
    }
}
