//! Filesystem operations

use std::fs;
use std::io;
use std::path::Path;

use super::entry::entity_from_path;
use crate::entity::Entity;

/// Read directory contents, folders first, then by case-insensitive name
pub fn read_directory(provider: &str, path: &Path) -> io::Result<Vec<Entity>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        match entity_from_path(provider, &entry.path()) {
            Ok(entity) => entries.push(entity),
            Err(e) => {
                // Entries we can't stat (permission denied, dangling...) are skipped
                tracing::debug!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
            }
        }
    }

    sort_entries(&mut entries);
    Ok(entries)
}

/// Folders first, then by case-insensitive name
pub fn sort_entries(entries: &mut [Entity]) {
    entries.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}
