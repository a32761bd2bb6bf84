//! Paste with per-item conflict resolution
//!
//! Every item of a batch goes through: check whether the destination exists,
//! copy straight away when it does not, otherwise settle the conflict with a
//! remembered decision or by asking the [`ConflictResolver`]. A failing item
//! never stops the batch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clipboard::{Clipboard, ClipboardMode};
use crate::controller::FileController;
use crate::entity::Entity;
use crate::errors::{NavError, NavResult};

/// What to do with an item whose destination already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PasteDecision {
    /// Leave the destination alone
    Skip,
    /// Overwrite the destination
    Replace,
    /// Copy under a fresh `name (n).ext`
    KeepBoth,
}

/// The resolver's reply to one conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictAnswer {
    pub decision: PasteDecision,
    /// Use `decision` for the remaining conflicts of the batch without asking
    pub apply_to_all: bool,
}

impl ConflictAnswer {
    pub fn once(decision: PasteDecision) -> Self {
        Self { decision, apply_to_all: false }
    }

    pub fn for_all(decision: PasteDecision) -> Self {
        Self { decision, apply_to_all: true }
    }
}

/// A destination collision awaiting a decision
#[derive(Debug)]
pub struct Conflict<'a> {
    pub source: &'a Entity,
    pub dest_dir: &'a Entity,
    pub dest_path: &'a str,
}

/// Asked once per conflict unless a decision is remembered
pub trait ConflictResolver {
    fn resolve(&mut self, conflict: &Conflict<'_>) -> ConflictAnswer;
}

impl<F> ConflictResolver for F
where
    F: FnMut(&Conflict<'_>) -> ConflictAnswer,
{
    fn resolve(&mut self, conflict: &Conflict<'_>) -> ConflictAnswer {
        self(conflict)
    }
}

/// Answers every conflict the same way
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub PasteDecision);

impl ConflictResolver for FixedDecision {
    fn resolve(&mut self, _conflict: &Conflict<'_>) -> ConflictAnswer {
        ConflictAnswer::once(self.0)
    }
}

/// Engine state between items of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PasteState {
    /// Conflicts go to the resolver
    #[default]
    Idle,
    /// Apply-to-all was chosen; conflicts use this decision
    Remembered(PasteDecision),
}

#[derive(Debug)]
pub enum PasteOutcome {
    /// No conflict
    Copied(Arc<Entity>),
    Replaced(Arc<Entity>),
    KeptBoth(Arc<Entity>),
    Skipped,
    Failed(NavError),
}

impl PasteOutcome {
    /// The entity now at the destination, when the item was written
    pub fn pasted(&self) -> Option<&Arc<Entity>> {
        match self {
            PasteOutcome::Copied(e) | PasteOutcome::Replaced(e) | PasteOutcome::KeptBoth(e) => Some(e),
            PasteOutcome::Skipped | PasteOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct PasteItem {
    pub source: Arc<Entity>,
    pub outcome: PasteOutcome,
}

/// Per-item results of one batch, in selection order
#[derive(Debug, Default)]
pub struct PasteReport {
    pub items: Vec<PasteItem>,
    /// Cut sources that were pasted but could not be removed afterwards
    pub cut_leftovers: Vec<(Arc<Entity>, NavError)>,
}

impl PasteReport {
    pub fn pasted(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.pasted().is_some()).count()
    }

    pub fn skipped(&self) -> usize {
        self.items.iter().filter(|i| matches!(i.outcome, PasteOutcome::Skipped)).count()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| matches!(i.outcome, PasteOutcome::Failed(_))).count()
    }
}

#[derive(Debug, Default)]
pub struct PasteEngine {
    state: PasteState,
}

impl PasteEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PasteState {
        self.state
    }

    /// Decision applied to conflicts without asking, if any
    pub fn pending_decision(&self) -> Option<PasteDecision> {
        match self.state {
            PasteState::Idle => None,
            PasteState::Remembered(decision) => Some(decision),
        }
    }

    pub fn is_apply_to_all(&self) -> bool {
        matches!(self.state, PasteState::Remembered(_))
    }

    /// Paste `items` into `dest_dir`.
    ///
    /// The destination listing is invalidated afterwards and the engine is
    /// back to [`PasteState::Idle`], whatever happened to the items.
    pub fn paste(
        &mut self,
        controller: &FileController,
        items: &[Arc<Entity>],
        dest_dir: &Entity,
        resolver: &mut dyn ConflictResolver,
    ) -> NavResult<PasteReport> {
        if !dest_dir.is_dir() {
            return Err(NavError::InvalidSelection(format!("{} is not a folder", dest_dir.match_path())));
        }
        info!(count = items.len(), dest = dest_dir.match_path(), "paste started");

        let mut report = PasteReport::default();
        for source in items {
            let outcome = self.paste_one(controller, source, dest_dir, resolver);
            if let PasteOutcome::Failed(e) = &outcome {
                warn!(source = source.match_path(), error = %e, "paste item failed");
            }
            report.items.push(PasteItem { source: Arc::clone(source), outcome });
        }

        self.state = PasteState::Idle;
        controller.invalidate(&dest_dir.provider, dest_dir.match_path());
        info!(pasted = report.pasted(), skipped = report.skipped(), failed = report.failed(), "paste finished");
        Ok(report)
    }

    /// Paste the clipboard; cut sources that made it across are deleted and
    /// a cut clipboard is emptied.
    pub fn paste_clipboard(
        &mut self,
        controller: &FileController,
        clipboard: &mut Clipboard,
        dest_dir: &Entity,
        resolver: &mut dyn ConflictResolver,
    ) -> NavResult<PasteReport> {
        let items = clipboard.items().to_vec();
        let mut report = self.paste(controller, &items, dest_dir, resolver)?;
        if clipboard.mode() != ClipboardMode::Cut {
            return Ok(report);
        }

        for item in &report.items {
            if item.outcome.pasted().is_none() {
                continue;
            }
            let source = &item.source;
            let result = controller
                .delete(&source.provider, std::slice::from_ref(source))
                .and_then(|outcome| match outcome.failed.into_iter().next() {
                    Some((_, e)) => Err(e.into()),
                    None => Ok(()),
                });
            controller.invalidate_parent(source);
            if let Err(e) = result {
                warn!(source = source.match_path(), error = %e, "could not remove cut source");
                report.cut_leftovers.push((Arc::clone(source), e));
            }
        }
        clipboard.clear();
        Ok(report)
    }

    fn paste_one(
        &mut self,
        controller: &FileController,
        source: &Arc<Entity>,
        dest_dir: &Entity,
        resolver: &mut dyn ConflictResolver,
    ) -> PasteOutcome {
        if source.is_dir() && source.provider == dest_dir.provider && is_same_or_below(dest_dir.match_path(), source.match_path()) {
            return PasteOutcome::Failed(NavError::InvalidSelection(format!(
                "cannot paste {} into itself",
                source.match_path()
            )));
        }

        let dest_path = match controller.join_path(dest_dir, &source.name) {
            Ok(path) => path,
            Err(e) => return PasteOutcome::Failed(e),
        };

        let exists = match controller.exists(dest_dir, &dest_path) {
            Ok(exists) => exists,
            Err(e) => return PasteOutcome::Failed(e),
        };
        if !exists {
            return match controller.copy_entity(source, dest_dir, &dest_path, false) {
                Ok(copied) => PasteOutcome::Copied(copied),
                Err(e) => PasteOutcome::Failed(e),
            };
        }

        let decision = match self.state {
            PasteState::Remembered(decision) => decision,
            PasteState::Idle => {
                let answer = resolver.resolve(&Conflict { source, dest_dir, dest_path: &dest_path });
                if answer.apply_to_all {
                    self.state = PasteState::Remembered(answer.decision);
                }
                answer.decision
            }
        };
        debug!(source = source.match_path(), dest = %dest_path, ?decision, "conflict settled");

        match decision {
            PasteDecision::Skip => PasteOutcome::Skipped,
            PasteDecision::Replace => {
                if source.provider == dest_dir.provider && source.match_path() == dest_path {
                    // replacing an item with itself leaves nothing to do
                    return PasteOutcome::Skipped;
                }
                if source.provider == dest_dir.provider && is_same_or_below(source.match_path(), &dest_path) {
                    return PasteOutcome::Failed(NavError::InvalidSelection(format!(
                        "cannot replace {} with its own content {}",
                        dest_path,
                        source.match_path()
                    )));
                }
                match controller.copy_entity(source, dest_dir, &dest_path, true) {
                    Ok(copied) => PasteOutcome::Replaced(copied),
                    Err(e) => PasteOutcome::Failed(e),
                }
            }
            PasteDecision::KeepBoth => {
                let unique = match controller.unique_name(dest_dir, &dest_path) {
                    Ok(unique) => unique,
                    Err(e) => return PasteOutcome::Failed(e),
                };
                match controller.copy_entity(source, dest_dir, &unique, false) {
                    Ok(copied) => PasteOutcome::KeptBoth(copied),
                    Err(e) => PasteOutcome::Failed(e),
                }
            }
        }
    }
}

/// `path` is `ancestor` or lies below it, in either separator grammar
fn is_same_or_below(path: &str, ancestor: &str) -> bool {
    let ancestor = ancestor.trim_end_matches(['/', '\\']);
    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '\\']),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FileFilter;
    use crate::providers::{FileProvider, MemoryRepository, ProviderRegistry, RepositoryProvider};

    fn setup() -> (FileController, Arc<Entity>, Vec<Arc<Entity>>) {
        let store = MemoryRepository::new()
            .with_file("/src/a.txt", b"new a")
            .with_file("/src/b.txt", b"new b")
            .with_file("/src/c.txt", b"new c")
            .with_file("/dst/a.txt", b"old a")
            .with_file("/dst/b.txt", b"old b");
        let controller =
            FileController::new(ProviderRegistry::new().with(Arc::new(RepositoryProvider::new(Arc::new(store)))));
        let root = Arc::clone(&controller.tree("repository").unwrap().children[0]);
        let top = controller.get_files(&root, &FileFilter::all(), true).unwrap();
        let dst = top.iter().find(|e| e.name == "dst").cloned().unwrap();
        let src = top.iter().find(|e| e.name == "src").cloned().unwrap();
        let items = controller.get_files(&src, &FileFilter::all(), true).unwrap().to_vec();
        (controller, dst, items)
    }

    fn names(controller: &FileController, dir: &Entity) -> Vec<String> {
        controller.get_files(dir, &FileFilter::all(), true).unwrap().iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn test_replace_apply_to_all_asks_once() {
        let (controller, dst, items) = setup();
        let mut engine = PasteEngine::new();
        let mut asked = 0;
        let mut resolver = |_: &Conflict<'_>| {
            asked += 1;
            ConflictAnswer::for_all(PasteDecision::Replace)
        };

        let report = engine.paste(&controller, &items, &dst, &mut resolver).unwrap();
        assert_eq!(asked, 1);
        assert!(matches!(report.items[0].outcome, PasteOutcome::Replaced(_)));
        assert!(matches!(report.items[1].outcome, PasteOutcome::Replaced(_)));
        assert!(matches!(report.items[2].outcome, PasteOutcome::Copied(_)));

        assert_eq!(engine.state(), PasteState::Idle);
        assert!(engine.pending_decision().is_none());
        assert!(!engine.is_apply_to_all());
    }

    #[test]
    fn test_keep_both_and_skip() {
        let (controller, dst, items) = setup();
        let mut engine = PasteEngine::new();
        let mut answers = vec![ConflictAnswer::once(PasteDecision::KeepBoth), ConflictAnswer::once(PasteDecision::Skip)];
        let mut resolver = move |_: &Conflict<'_>| answers.remove(0);

        let report = engine.paste(&controller, &items, &dst, &mut resolver).unwrap();
        assert_eq!(report.pasted(), 2);
        assert_eq!(report.skipped(), 1);

        let listed = names(&controller, &dst);
        assert!(listed.contains(&"a (1).txt".to_string()));
        assert!(listed.contains(&"c.txt".to_string()));
        assert!(!listed.contains(&"b (1).txt".to_string()));
    }

    #[test]
    fn test_folder_into_itself_fails_item_only() {
        let (controller, dst, items) = setup();
        let mut engine = PasteEngine::new();
        let dst_items = vec![Arc::clone(&dst), Arc::clone(&items[2])];
        let report = engine.paste(&controller, &dst_items, &dst, &mut FixedDecision(PasteDecision::Skip)).unwrap();
        assert!(matches!(report.items[0].outcome, PasteOutcome::Failed(NavError::InvalidSelection(_))));
        assert!(matches!(report.items[1].outcome, PasteOutcome::Copied(_)));
    }

    #[test]
    fn test_cut_removes_sources() {
        let (controller, dst, items) = setup();
        let src_root = Arc::clone(&controller.tree("repository").unwrap().children[0]);
        let mut clipboard = Clipboard::new();
        clipboard.cut(vec![Arc::clone(&items[2])]);

        let mut engine = PasteEngine::new();
        let report =
            engine.paste_clipboard(&controller, &mut clipboard, &dst, &mut FixedDecision(PasteDecision::Skip)).unwrap();
        assert_eq!(report.pasted(), 1);
        assert!(report.cut_leftovers.is_empty());
        assert!(clipboard.is_empty());

        let src = controller
            .get_files(&src_root, &FileFilter::all(), true)
            .unwrap()
            .iter()
            .find(|e| e.name == "src")
            .cloned()
            .unwrap();
        assert!(!names(&controller, &src).contains(&"c.txt".to_string()));
        assert!(names(&controller, &dst).contains(&"c.txt".to_string()));
    }

    #[test]
    fn test_is_same_or_below() {
        assert!(is_same_or_below("/a/b", "/a"));
        assert!(is_same_or_below("/a", "/a"));
        assert!(!is_same_or_below("/ab", "/a"));
        assert!(is_same_or_below("C:\\a\\b", "C:\\a"));
    }

    /// Repository that cannot come up with a free name for `a.txt`
    struct NoFreeNames(RepositoryProvider);

    impl FileProvider for NoFreeNames {
        fn id(&self) -> &str {
            self.0.id()
        }
        fn info(&self) -> &crate::providers::ProviderInfo {
            self.0.info()
        }
        fn get_tree(&self) -> crate::providers::ProviderResult<crate::entity::Tree> {
            self.0.get_tree()
        }
        fn list_directory(&self, dir: &Entity) -> crate::providers::ProviderResult<Vec<Entity>> {
            self.0.list_directory(dir)
        }
        fn create_directory(
            &self,
            parent_path: &str,
            reference: &Entity,
            name: &str,
        ) -> crate::providers::ProviderResult<Entity> {
            self.0.create_directory(parent_path, reference, name)
        }
        fn delete(&self, entities: &[Arc<Entity>]) -> crate::providers::DeleteOutcome {
            self.0.delete(entities)
        }
        fn exists(&self, parent: &Entity, candidate_path: &str) -> crate::providers::ProviderResult<bool> {
            self.0.exists(parent, candidate_path)
        }
        fn unique_name(&self, parent: &Entity, candidate_path: &str) -> crate::providers::ProviderResult<String> {
            if candidate_path.ends_with("/a.txt") {
                return Err(crate::providers::ProviderError::Other("no free name".to_string()));
            }
            self.0.unique_name(parent, candidate_path)
        }
        fn copy(&self, source: &Entity, dest_path: &str, overwrite: bool) -> crate::providers::ProviderResult<Entity> {
            self.0.copy(source, dest_path, overwrite)
        }
        fn read_file(&self, entity: &Entity) -> crate::providers::ProviderResult<Vec<u8>> {
            self.0.read_file(entity)
        }
        fn write_file(
            &self,
            parent: &Entity,
            dest_path: &str,
            data: &[u8],
            overwrite: bool,
        ) -> crate::providers::ProviderResult<Entity> {
            self.0.write_file(parent, dest_path, data, overwrite)
        }
        fn rename(&self, entity: &Entity, new_name: &str) -> crate::providers::ProviderResult<Entity> {
            self.0.rename(entity, new_name)
        }
        fn join_path(&self, base: &str, name: &str) -> String {
            self.0.join_path(base, name)
        }
        fn parent_path(&self, path: &str) -> Option<String> {
            self.0.parent_path(path)
        }
    }

    #[test]
    fn test_keep_both_naming_failure_fails_item_only() {
        let store = MemoryRepository::new()
            .with_file("/src/a.txt", b"new a")
            .with_file("/src/b.txt", b"new b")
            .with_file("/src/c.txt", b"new c")
            .with_file("/dst/a.txt", b"old a")
            .with_file("/dst/b.txt", b"old b");
        let provider = NoFreeNames(RepositoryProvider::new(Arc::new(store)));
        let controller = FileController::new(ProviderRegistry::new().with(Arc::new(provider)));
        let root = Arc::clone(&controller.tree("repository").unwrap().children[0]);
        let top = controller.get_files(&root, &FileFilter::all(), true).unwrap();
        let dst = top.iter().find(|e| e.name == "dst").cloned().unwrap();
        let src = top.iter().find(|e| e.name == "src").cloned().unwrap();
        let items = controller.get_files(&src, &FileFilter::all(), true).unwrap().to_vec();

        let mut engine = PasteEngine::new();
        let mut resolver = |_: &Conflict<'_>| ConflictAnswer::for_all(PasteDecision::KeepBoth);
        let report = engine.paste(&controller, &items, &dst, &mut resolver).unwrap();

        assert!(matches!(report.items[0].outcome, PasteOutcome::Failed(_)));
        assert!(matches!(report.items[1].outcome, PasteOutcome::KeptBoth(_)));
        assert!(matches!(report.items[2].outcome, PasteOutcome::Copied(_)));
        assert_eq!(engine.state(), PasteState::Idle);

        let listed = names(&controller, &dst);
        assert!(listed.contains(&"b (1).txt".to_string()));
        assert!(!listed.contains(&"a (1).txt".to_string()));
    }

    #[test]
    fn test_replace_over_own_ancestor_keeps_data() {
        use crate::providers::LocalProvider;

        let tmp = tempfile::tempdir().unwrap();
        let outer_path = tmp.path().join("reports");
        std::fs::create_dir_all(outer_path.join("reports")).unwrap();
        std::fs::write(outer_path.join("reports").join("q1.csv"), b"q1").unwrap();
        std::fs::write(outer_path.join("keep.txt"), b"keep").unwrap();

        let local = LocalProvider::with_roots(vec![tmp.path().to_path_buf()]);
        let controller = FileController::new(ProviderRegistry::new().with(Arc::new(local)));
        let root = Arc::clone(&controller.tree("local").unwrap().children[0]);
        let outer = Arc::clone(&controller.get_files(&root, &FileFilter::all(), true).unwrap()[0]);
        let inner = controller
            .get_files(&outer, &FileFilter::all(), true)
            .unwrap()
            .iter()
            .find(|e| e.is_dir())
            .cloned()
            .unwrap();

        let mut engine = PasteEngine::new();
        let report = engine.paste(&controller, &[inner], &root, &mut FixedDecision(PasteDecision::Replace)).unwrap();

        assert!(matches!(report.items[0].outcome, PasteOutcome::Failed(NavError::InvalidSelection(_))));
        assert!(outer_path.join("keep.txt").exists());
        assert_eq!(std::fs::read(outer_path.join("reports").join("q1.csv")).unwrap(), b"q1");
    }
}
