//! Local filesystem entries as entities

use std::fs;
use std::path::Path;

use crate::entity::{Entity, EntityKind};

/// Lossy string form of a local path
pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Create an entity for a local path
///
/// Symlinks are followed for the file/folder decision and size, like a
/// directory listing in a file manager would show them.
pub fn entity_from_path(provider: &str, path: &Path) -> std::io::Result<Entity> {
    let metadata = fs::symlink_metadata(path)?;
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_string(path));

    let target_metadata = if metadata.is_symlink() {
        fs::metadata(path).ok()
    } else {
        Some(metadata.clone())
    };

    let is_dir = target_metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false);
    let kind = if is_dir { EntityKind::Folder } else { EntityKind::File };
    let size = if is_dir {
        None
    } else {
        target_metadata.as_ref().map(|m| m.len())
    };

    let mut entity = Entity::new(kind, provider, path_string(path), name)
        .with_parent(path.parent().map(path_string))
        .with_modified(metadata.modified().ok())
        .with_size(size);

    if metadata.permissions().readonly() {
        entity = entity.read_only();
    }

    Ok(entity)
}
