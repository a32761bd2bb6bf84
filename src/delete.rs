//! Batch delete

use std::sync::Arc;

use tracing::{info, warn};

use crate::controller::FileController;
use crate::entity::{Entity, EntityKind, Listing};
use crate::errors::{NavError, NavResult};

#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: Vec<Arc<Entity>>,
    pub failed: Vec<(Arc<Entity>, NavError)>,
    /// Fresh listing of the directory the selection came from, when it could be re-read
    pub refreshed: Option<Listing>,
}

/// Delete a single-provider selection.
///
/// Each item succeeds or fails on its own. The parent listings are
/// invalidated and `parent_dir` re-listed whatever the outcome; only a batch
/// in which nothing was deleted is an error.
pub fn delete_batch(
    controller: &FileController,
    selection: &[Arc<Entity>],
    parent_dir: Option<&Entity>,
) -> NavResult<DeleteReport> {
    let Some(first) = selection.first() else {
        return Err(NavError::InvalidSelection("nothing selected".to_string()));
    };
    if selection.iter().any(|e| e.provider != first.provider) {
        return Err(NavError::InvalidSelection("selection spans several providers".to_string()));
    }

    let outcome = controller.delete(&first.provider, selection)?;
    info!(
        provider = %first.provider,
        deleted = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        "delete batch"
    );

    for entity in selection {
        controller.invalidate_parent(entity);
    }
    let refreshed = parent_dir.and_then(|dir| match controller.refresh(dir) {
        Ok(listing) => Some(listing),
        Err(e) => {
            warn!(path = dir.match_path(), error = %e, "could not re-list after delete");
            None
        }
    });

    if outcome.succeeded.is_empty() {
        let kind = if selection.iter().any(|e| e.is_dir()) { EntityKind::Folder } else { EntityKind::File };
        return Err(NavError::DeleteFailed { kind });
    }

    Ok(DeleteReport {
        deleted: outcome.succeeded,
        failed: outcome.failed.into_iter().map(|(e, err)| (e, err.into())).collect(),
        refreshed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FileFilter;
    use crate::providers::{MemoryRepository, ProviderRegistry, RepositoryProvider};

    fn setup() -> (FileController, Arc<Entity>) {
        let store = MemoryRepository::new().with_file("/d/a.txt", b"a").with_file("/d/b.txt", b"b");
        let controller =
            FileController::new(ProviderRegistry::new().with(Arc::new(RepositoryProvider::new(Arc::new(store)))));
        let root = Arc::clone(&controller.tree("repository").unwrap().children[0]);
        let dir = Arc::clone(&controller.get_files(&root, &FileFilter::all(), true).unwrap()[0]);
        (controller, dir)
    }

    #[test]
    fn test_empty_and_mixed_selection() {
        let (controller, _) = setup();
        assert!(matches!(delete_batch(&controller, &[], None), Err(NavError::InvalidSelection(_))));

        let mixed = vec![
            Arc::new(Entity::file("repository", "/d/a.txt", "a.txt")),
            Arc::new(Entity::file("local", "/tmp/a.txt", "a.txt")),
        ];
        assert!(matches!(delete_batch(&controller, &mixed, None), Err(NavError::InvalidSelection(_))));
    }

    #[test]
    fn test_nothing_deleted_reports_kind() {
        let (controller, dir) = setup();
        let ghost = Arc::new(
            Entity::directory("repository", "/d/ghost", "ghost").with_details(crate::entity::EntityDetails::Repository {
                object_id: "ffffffff".to_string(),
                root: false,
            }),
        );
        let before = controller.get_files(&dir, &FileFilter::all(), true).unwrap();
        let result = delete_batch(&controller, &[ghost], Some(&dir));
        assert!(matches!(result, Err(NavError::DeleteFailed { kind: EntityKind::Folder })));
        let after = controller.get_files(&dir, &FileFilter::all(), true).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
