//! Selection state and the result fields derived from it
//!
//! [`SelectionState::derive`] is a pure function of the tree selection, the
//! list selection, the typed file name, the mode and the active filter:
//! deriving twice from the same state gives the same [`FileDetails`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind, Node};
use crate::errors::NavError;
use crate::filter::FileFilter;

/// What the caller asked the session for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationMode {
    #[default]
    Open,
    SelectFile,
    SelectFolder,
    SelectFileFolder,
    Save,
    SaveTo,
    SaveToFileFolder,
}

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Open => "open",
            OperationMode::SelectFile => "selectFile",
            OperationMode::SelectFolder => "selectFolder",
            OperationMode::SelectFileFolder => "selectFileFolder",
            OperationMode::Save => "save",
            OperationMode::SaveTo => "saveTo",
            OperationMode::SaveToFileFolder => "saveToFileFolder",
        }
    }

    /// Modes where the file name is typed rather than picked
    pub fn is_save(&self) -> bool {
        matches!(self, OperationMode::Save | OperationMode::SaveTo | OperationMode::SaveToFileFolder)
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [OperationMode; 7] = [
            OperationMode::Open,
            OperationMode::SelectFile,
            OperationMode::SelectFolder,
            OperationMode::SelectFileFolder,
            OperationMode::Save,
            OperationMode::SaveTo,
            OperationMode::SaveToFileFolder,
        ];
        ALL.into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NavError::NotSupported(format!("operation '{}'", s)))
    }
}

/// Result fields handed back to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetails {
    pub path: Option<String>,
    pub parent_path: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<EntityKind>,
    pub provider: Option<String>,
    pub connection: Option<String>,
    pub object_id: Option<String>,
}

impl FileDetails {
    fn from_directory(dir: &Entity) -> Self {
        Self {
            path: Some(dir.match_path().to_string()),
            parent_path: dir.match_parent().map(str::to_string),
            name: None,
            kind: Some(EntityKind::Folder),
            provider: Some(dir.origin_provider().to_string()),
            connection: dir.connection().map(str::to_string),
            object_id: dir.object_id().map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Current tree selection, list selection and typed file name
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    mode: OperationMode,
    tree_selection: Option<Node>,
    list_selection: Vec<Arc<Entity>>,
    file_name: String,
}

impl SelectionState {
    pub fn new(mode: OperationMode) -> Self {
        Self { mode, ..Self::default() }
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    /// Select a directory (or tree) in the navigation pane; the list selection is dropped
    pub fn select_tree(&mut self, node: Node) {
        self.tree_selection = Some(node);
        self.list_selection.clear();
    }

    /// Select entries of the current listing.
    ///
    /// In save modes picking a single file copies its name into the typed name.
    pub fn select_list(&mut self, entities: Vec<Arc<Entity>>) {
        if self.mode.is_save()
            && let [only] = entities.as_slice()
            && !only.is_dir()
        {
            self.file_name = only.name.clone();
        }
        self.list_selection = entities;
    }

    pub fn clear_list(&mut self) {
        self.list_selection.clear();
    }

    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = name.into();
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn tree_selection(&self) -> Option<&Node> {
        self.tree_selection.as_ref()
    }

    pub fn list_selection(&self) -> &[Arc<Entity>] {
        &self.list_selection
    }

    /// The node details are derived from: list selection first, then tree selection
    pub fn focused(&self) -> Option<Node> {
        match self.list_selection.first() {
            Some(entity) => Some(Node::Entity(Arc::clone(entity))),
            None => self.tree_selection.clone(),
        }
    }

    /// Derive the result fields for the active filter
    pub fn derive(&self, filter: &FileFilter) -> FileDetails {
        let Some(node) = self.focused() else {
            return FileDetails::default();
        };

        let mut details = match &node {
            Node::Tree(tree) => FileDetails {
                kind: Some(EntityKind::Folder),
                provider: Some(tree.provider.clone()),
                ..FileDetails::default()
            },
            Node::Entity(entity) if entity.is_dir() => FileDetails::from_directory(entity),
            Node::Entity(entity) => {
                if self.mode.is_save() {
                    // the containing directory is the save target
                    FileDetails {
                        path: entity.match_parent().map(str::to_string),
                        parent_path: None,
                        name: None,
                        kind: Some(EntityKind::Folder),
                        provider: Some(entity.origin_provider().to_string()),
                        connection: entity.connection().map(str::to_string),
                        object_id: None,
                    }
                } else {
                    FileDetails {
                        path: Some(entity.match_path().to_string()),
                        parent_path: entity.match_parent().map(str::to_string),
                        name: filter.accepts(entity).then(|| entity.name.clone()),
                        kind: Some(EntityKind::File),
                        provider: Some(entity.origin_provider().to_string()),
                        connection: entity.connection().map(str::to_string),
                        object_id: entity.object_id().map(str::to_string),
                    }
                }
            }
        };

        if self.mode.is_save() {
            let typed = self.file_name.trim();
            if !typed.is_empty() {
                details.name = Some(typed.to_string());
                details.kind = Some(EntityKind::File);
            }
        }
        details
    }

    /// Whether the derived details are enough to confirm in the current mode
    pub fn can_confirm(&self, details: &FileDetails) -> bool {
        let has_path = details.path.is_some();
        let has_name = details.name.is_some();
        match self.mode {
            OperationMode::Open | OperationMode::SelectFile => has_name,
            OperationMode::SelectFolder => has_path && !has_name,
            OperationMode::SelectFileFolder => has_path || has_name,
            OperationMode::Save | OperationMode::SaveTo | OperationMode::SaveToFileFolder => has_path && has_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Tree;

    fn dir() -> Arc<Entity> {
        Arc::new(Entity::directory("local", "/data", "data").with_parent(Some("/".to_string())))
    }

    fn csv() -> Arc<Entity> {
        Arc::new(Entity::file("local", "/data/a.csv", "a.csv").with_parent(Some("/data".to_string())))
    }

    #[test]
    fn test_mode_names() {
        assert_eq!("selectFileFolder".parse::<OperationMode>().unwrap(), OperationMode::SelectFileFolder);
        assert_eq!("SAVETO".parse::<OperationMode>().unwrap(), OperationMode::SaveTo);
        assert!("explode".parse::<OperationMode>().is_err());
    }

    #[test]
    fn test_open_file_and_directory() {
        let mut state = SelectionState::new(OperationMode::Open);
        state.select_tree(Node::Entity(dir()));
        let details = state.derive(&FileFilter::all());
        assert_eq!(details.path.as_deref(), Some("/data"));
        assert_eq!(details.name, None);
        assert!(!state.can_confirm(&details));

        state.select_list(vec![csv()]);
        let details = state.derive(&FileFilter::all());
        assert_eq!(details.name.as_deref(), Some("a.csv"));
        assert_eq!(details.parent_path.as_deref(), Some("/data"));
        assert!(state.can_confirm(&details));
        assert_eq!(details, state.derive(&FileFilter::all()));
    }

    #[test]
    fn test_filtered_out_file_clears_name() {
        let mut state = SelectionState::new(OperationMode::Open);
        state.select_list(vec![csv()]);
        let txt = FileFilter::new("TXT", "*.txt", "Text").unwrap();
        let details = state.derive(&txt);
        assert_eq!(details.name, None);
        assert_eq!(details.path.as_deref(), Some("/data/a.csv"));
    }

    #[test]
    fn test_select_folder() {
        let mut state = SelectionState::new(OperationMode::SelectFolder);
        state.select_tree(Node::Entity(dir()));
        assert!(state.can_confirm(&state.derive(&FileFilter::all())));
        state.select_list(vec![csv()]);
        assert!(!state.can_confirm(&state.derive(&FileFilter::all())));
    }

    #[test]
    fn test_save_uses_typed_name() {
        let mut state = SelectionState::new(OperationMode::Save);
        state.select_tree(Node::Entity(dir()));
        assert!(!state.can_confirm(&state.derive(&FileFilter::all())));

        state.set_file_name("out.csv");
        let details = state.derive(&FileFilter::all());
        assert_eq!(details.path.as_deref(), Some("/data"));
        assert_eq!(details.name.as_deref(), Some("out.csv"));
        assert!(state.can_confirm(&details));

        state.select_list(vec![csv()]);
        let details = state.derive(&FileFilter::all());
        assert_eq!(details.path.as_deref(), Some("/data"));
        assert_eq!(details.name.as_deref(), Some("a.csv"));
    }

    #[test]
    fn test_tree_selection_has_no_path() {
        let mut state = SelectionState::new(OperationMode::SelectFileFolder);
        state.select_tree(Node::Tree(Arc::new(Tree::new("Local", "local", Vec::new()))));
        let details = state.derive(&FileFilter::all());
        assert_eq!(details.provider.as_deref(), Some("local"));
        assert!(!state.can_confirm(&details));
    }
}
