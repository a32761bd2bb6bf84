//! Entity model shared by every provider
//!
//! Entities are immutable snapshots produced by provider listings. A directory's
//! children are never edited in place: a refresh replaces the whole [`Listing`].

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Whether an entity is a leaf file or a folder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    File,
    Folder,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::File => "file",
            EntityKind::Folder => "folder",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-family specific data carried by an entity
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityDetails {
    /// Local disk; path uses the OS separator
    Local,
    /// Content repository object; path uses a single `/` root
    Repository {
        object_id: String,
        /// Marks the synthetic `/` listing entry at the top of a repository tree
        root: bool,
    },
    /// Entry behind a VFS connection
    Vfs {
        connection: String,
        /// Path in `pvfs://<connection>/<path>` form
        connection_path: String,
        connection_parent_path: Option<String>,
    },
    /// Entry of the recent-files pseudo-provider
    Recent {
        origin_provider: String,
        connection: Option<String>,
        object_id: Option<String>,
    },
}

/// A file or directory as returned by a provider listing
#[derive(Clone, Debug)]
pub struct Entity {
    /// Base name (no parent path)
    pub name: String,
    /// Full path in the provider's own grammar
    pub path: String,
    /// Path of the containing directory, if any
    pub parent: Option<String>,
    /// Id of the provider that produced this entity
    pub provider: String,
    pub kind: EntityKind,
    pub can_edit: bool,
    /// Folders only: whether new children may be created inside
    pub can_add_children: bool,
    /// Folders only: `false` means the folder is known to be empty
    pub has_children: bool,
    pub modified: Option<SystemTime>,
    /// File size in bytes (files only, when known)
    pub size: Option<u64>,
    pub details: EntityDetails,
}

impl Entity {
    pub fn new(
        kind: EntityKind,
        provider: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let is_dir = kind == EntityKind::Folder;
        Self {
            name: name.into(),
            path: path.into(),
            parent: None,
            provider: provider.into(),
            kind,
            can_edit: true,
            can_add_children: is_dir,
            has_children: is_dir,
            modified: None,
            size: None,
            details: EntityDetails::Local,
        }
    }

    /// Create a file entity
    pub fn file(provider: impl Into<String>, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(EntityKind::File, provider, path, name)
    }

    /// Create a directory entity
    pub fn directory(provider: impl Into<String>, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(EntityKind::Folder, provider, path, name)
    }

    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_details(mut self, details: EntityDetails) -> Self {
        self.details = details;
        self
    }

    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_has_children(mut self, has_children: bool) -> Self {
        self.has_children = has_children;
        self
    }

    /// Mark the entity as not editable (no rename, no new children)
    pub fn read_only(mut self) -> Self {
        self.can_edit = false;
        self.can_add_children = false;
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntityKind::Folder
    }

    /// The string path resolution, cache keys and node identity work with.
    ///
    /// VFS entities are matched by their connection path, everything else by `path`.
    pub fn match_path(&self) -> &str {
        match &self.details {
            EntityDetails::Vfs { connection_path, .. } => connection_path,
            _ => &self.path,
        }
    }

    /// Parent in the same grammar as [`Entity::match_path`]
    pub fn match_parent(&self) -> Option<&str> {
        match &self.details {
            EntityDetails::Vfs { connection_parent_path, .. } => connection_parent_path.as_deref(),
            _ => self.parent.as_deref(),
        }
    }

    pub fn connection(&self) -> Option<&str> {
        match &self.details {
            EntityDetails::Vfs { connection, .. } => Some(connection),
            EntityDetails::Recent { connection, .. } => connection.as_deref(),
            _ => None,
        }
    }

    pub fn object_id(&self) -> Option<&str> {
        match &self.details {
            EntityDetails::Repository { object_id, .. } => Some(object_id),
            EntityDetails::Recent { object_id, .. } => object_id.as_deref(),
            _ => None,
        }
    }

    /// Provider the entity really lives in; differs from `provider` for recent entries
    pub fn origin_provider(&self) -> &str {
        match &self.details {
            EntityDetails::Recent { origin_provider, .. } => origin_provider,
            _ => &self.provider,
        }
    }

    /// True for the synthetic `/` entry a repository tree lists first
    pub fn is_repository_root(&self) -> bool {
        matches!(self.details, EntityDetails::Repository { root: true, .. })
    }

    /// File extension without the dot (files only)
    pub fn extension(&self) -> Option<&str> {
        if self.is_dir() {
            return None;
        }
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Same provider and same match path
    pub fn same_as(&self, other: &Entity) -> bool {
        self.provider == other.provider && self.match_path() == other.match_path()
    }
}

/// Root node of one provider instance
#[derive(Clone, Debug)]
pub struct Tree {
    pub name: String,
    pub provider: String,
    pub has_children: bool,
    /// Top-level directories/files of the provider
    pub children: Vec<Arc<Entity>>,
}

impl Tree {
    pub fn new(name: impl Into<String>, provider: impl Into<String>, children: Vec<Entity>) -> Self {
        let children: Vec<Arc<Entity>> = children.into_iter().map(Arc::new).collect();
        Self {
            name: name.into(),
            provider: provider.into(),
            has_children: !children.is_empty(),
            children,
        }
    }
}

/// Immutable snapshot of a directory's children
pub type Listing = Arc<Vec<Arc<Entity>>>;

/// Anything that can be selected: a provider tree or an entity in it
#[derive(Clone, Debug)]
pub enum Node {
    Tree(Arc<Tree>),
    Entity(Arc<Entity>),
}

impl Node {
    pub fn provider(&self) -> &str {
        match self {
            Node::Tree(t) => &t.provider,
            Node::Entity(e) => &e.provider,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Tree(t) => &t.name,
            Node::Entity(e) => &e.name,
        }
    }

    pub fn entity(&self) -> Option<&Arc<Entity>> {
        match self {
            Node::Entity(e) => Some(e),
            Node::Tree(_) => None,
        }
    }

    pub fn tree(&self) -> Option<&Arc<Tree>> {
        match self {
            Node::Tree(t) => Some(t),
            Node::Entity(_) => None,
        }
    }

    /// Trees count as directories: they have children and no name to pick
    pub fn is_dir(&self) -> bool {
        match self {
            Node::Tree(_) => true,
            Node::Entity(e) => e.is_dir(),
        }
    }

    /// Match path of the entity; trees have none
    pub fn match_path(&self) -> Option<&str> {
        self.entity().map(|e| e.match_path())
    }

    /// Identity comparison used by history and selection
    pub fn same_node(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Tree(a), Node::Tree(b)) => a.provider == b.provider && a.name == b.name,
            (Node::Entity(a), Node::Entity(b)) => a.same_as(b),
            _ => false,
        }
    }
}

impl From<Arc<Entity>> for Node {
    fn from(e: Arc<Entity>) -> Self {
        Node::Entity(e)
    }
}

impl From<Arc<Tree>> for Node {
    fn from(t: Arc<Tree>) -> Self {
        Node::Tree(t)
    }
}
