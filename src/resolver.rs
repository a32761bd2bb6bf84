//! Path resolution: walk a provider tree one path segment at a time
//!
//! A typed path is split into prefix segments (`C:\`, `C:\Users\`, ...) and
//! each segment is matched against the children of the previous match. The
//! same walk serves "go to typed path" and restoring the last used location.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::controller::FileController;
use crate::entity::{Entity, Listing, Tree};
use crate::errors::{NavError, NavResult};
use crate::filter::FileFilter;

/// Path syntax, detected from the string itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathGrammar {
    /// `C:\Users\file.txt`
    Windows,
    /// `pvfs://connection/dir/file`
    Vfs,
    /// `/dir/file`, used by local Unix paths and the repository
    Posix,
}

impl PathGrammar {
    /// Backslash wins, then `//`, then POSIX
    pub fn detect(path: &str) -> Self {
        if path.contains('\\') {
            PathGrammar::Windows
        } else if path.contains("//") {
            PathGrammar::Vfs
        } else {
            PathGrammar::Posix
        }
    }

    pub fn separator(&self) -> char {
        match self {
            PathGrammar::Windows => '\\',
            PathGrammar::Vfs | PathGrammar::Posix => '/',
        }
    }

    /// Every prefix of `path` that ends at a separator (separator kept),
    /// followed by `path` itself when it does not end with one.
    pub fn segments(&self, path: &str) -> Vec<String> {
        if path.is_empty() {
            return Vec::new();
        }
        let sep = self.separator();
        let first_end = match self {
            PathGrammar::Vfs => {
                let Some(scheme_end) = path.find("://").map(|i| i + 3) else {
                    return prefix_segments(path, sep, path.find(sep).map_or(path.len(), |i| i + 1));
                };
                match path[scheme_end..].find('/') {
                    Some(i) => scheme_end + i + 1,
                    // `pvfs://box` names the connection root
                    None => return vec![format!("{}/", path)],
                }
            }
            PathGrammar::Windows | PathGrammar::Posix => path.find(sep).map_or(path.len(), |i| i + 1),
        };
        prefix_segments(path, sep, first_end)
    }
}

fn prefix_segments(path: &str, sep: char, first_end: usize) -> Vec<String> {
    let mut segments = vec![path[..first_end].to_string()];
    for (i, c) in path[first_end..].char_indices() {
        if c == sep {
            segments.push(path[..first_end + i + 1].to_string());
        }
    }
    if first_end < path.len() && !path.ends_with(sep) {
        segments.push(path.to_string());
    }
    segments
}

/// `candidate` equals `segment`, or is a prefix of it that ends on a separator
fn is_boundary_prefix(candidate: &str, segment: &str, sep: char) -> bool {
    if candidate.is_empty() {
        return false;
    }
    match segment.strip_prefix(candidate) {
        Some("") => true,
        Some(rest) => candidate.ends_with(sep) || rest.starts_with(sep),
        None => false,
    }
}

/// Outcome of a successful walk
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Deepest entity matched
    pub entity: Arc<Entity>,
    /// Number of segments matched against a listing
    pub steps: usize,
    /// Matched entities from the top of the tree down to `entity`
    pub trail: Vec<Arc<Entity>>,
}

pub struct PathResolver<'a> {
    controller: &'a FileController,
    use_cache: bool,
}

impl<'a> PathResolver<'a> {
    pub fn new(controller: &'a FileController) -> Self {
        Self { controller, use_cache: true }
    }

    /// Bypass the listing cache for every fetch of the walk
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Resolve `path` inside the tree of `provider`
    pub fn resolve_in(&self, provider: &str, path: &str) -> NavResult<Resolution> {
        let tree = self.controller.tree(provider)?;
        self.resolve(&tree, path)
    }

    /// Walk `tree` along `path`.
    ///
    /// Stops at a file, at the last segment, at the first segment without a
    /// match, or when a listing fails; the deepest match is returned. Fails
    /// with [`NavError::PathNotFound`] when not even the first segment matches.
    pub fn resolve(&self, tree: &Tree, path: &str) -> NavResult<Resolution> {
        let grammar = PathGrammar::detect(path);
        let sep = grammar.separator();
        let mut segments = grammar.segments(path).into_iter().peekable();

        let mut current: Option<Arc<Entity>> = None;
        let mut trail = Vec::new();
        let mut steps = 0;
        let mut children: Listing = Arc::new(tree.children.clone());

        // A repository lists a synthetic `/` first: enter it without a step.
        // It only counts as a match when the path actually starts at `/`.
        if let Some(root) = tree.children.iter().find(|e| e.is_repository_root()) {
            if segments.peek().is_some_and(|s| s == "/") {
                segments.next();
                current = Some(Arc::clone(root));
                trail.push(Arc::clone(root));
            }
            children = self.controller.get_files(root, &FileFilter::all(), self.use_cache)?;
        }

        while let Some(segment) = segments.next() {
            let mut candidates: Vec<&Arc<Entity>> = children.iter().collect();
            candidates.sort_by(|a, b| b.match_path().len().cmp(&a.match_path().len()));

            let Some(hit) = candidates.into_iter().find(|c| is_boundary_prefix(c.match_path(), &segment, sep))
            else {
                debug!(segment = %segment, "no match, stopping");
                break;
            };
            let hit = Arc::clone(hit);
            steps += 1;
            trail.push(Arc::clone(&hit));
            current = Some(Arc::clone(&hit));

            if !hit.is_dir() || segments.peek().is_none() {
                break;
            }
            match self.controller.get_files(&hit, &FileFilter::all(), self.use_cache) {
                Ok(listing) => children = listing,
                Err(e) => {
                    warn!(path = hit.match_path(), error = %e, "listing failed, stopping at deepest match");
                    break;
                }
            }
        }

        let entity = current.ok_or_else(|| NavError::PathNotFound(path.to_string()))?;
        debug!(path, resolved = entity.match_path(), steps, "resolved path");
        Ok(Resolution { entity, steps, trail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::vfs::MemoryBackend;
    use crate::providers::{
        MemoryRepository, ProviderRegistry, RepositoryProvider, VfsBackend, VfsConnection, VfsProvider,
    };

    #[test]
    fn test_detect() {
        assert_eq!(PathGrammar::detect("C:\\Users"), PathGrammar::Windows);
        assert_eq!(PathGrammar::detect("pvfs://box/a"), PathGrammar::Vfs);
        assert_eq!(PathGrammar::detect("/public/a"), PathGrammar::Posix);
    }

    #[test]
    fn test_segments() {
        assert_eq!(
            PathGrammar::Windows.segments("C:\\Users\\test\\file.txt"),
            vec!["C:\\", "C:\\Users\\", "C:\\Users\\test\\", "C:\\Users\\test\\file.txt"]
        );
        assert_eq!(PathGrammar::Posix.segments("/public/report.ktr"), vec!["/", "/public/", "/public/report.ktr"]);
        assert_eq!(PathGrammar::Posix.segments("/public/"), vec!["/", "/public/"]);
        assert_eq!(
            PathGrammar::Vfs.segments("pvfs://box/data/x.csv"),
            vec!["pvfs://box/", "pvfs://box/data/", "pvfs://box/data/x.csv"]
        );
        assert_eq!(PathGrammar::Vfs.segments("pvfs://box"), vec!["pvfs://box/"]);
    }

    #[test]
    fn test_boundary_prefix() {
        assert!(is_boundary_prefix("/public", "/public/", '/'));
        assert!(is_boundary_prefix("/public", "/public", '/'));
        assert!(!is_boundary_prefix("/pub", "/public/", '/'));
        assert!(is_boundary_prefix("pvfs://box/", "pvfs://box/data/", '/'));
    }

    fn repository_controller() -> FileController {
        let store = MemoryRepository::new()
            .with_folder("/public/reports")
            .with_file("/public/report.ktr", b"")
            .with_file("/pub.txt", b"");
        FileController::new(ProviderRegistry::new().with(Arc::new(RepositoryProvider::new(Arc::new(store)))))
    }

    #[test]
    fn test_repository_skips_synthetic_root() {
        let controller = repository_controller();
        let resolution = PathResolver::new(&controller).resolve_in("repository", "/public/report.ktr").unwrap();
        assert_eq!(resolution.entity.name, "report.ktr");
        assert_eq!(resolution.steps, 2);
        assert!(resolution.trail[0].is_repository_root());
    }

    #[test]
    fn test_partial_match_returns_deepest() {
        let controller = repository_controller();
        let resolution = PathResolver::new(&controller).resolve_in("repository", "/public/missing/x.ktr").unwrap();
        assert_eq!(resolution.entity.match_path(), "/public");
        assert_eq!(resolution.steps, 1);
    }

    #[test]
    fn test_unrooted_path_not_found_in_repository() {
        let controller = repository_controller();
        let result = PathResolver::new(&controller).resolve_in("repository", "C:\\public");
        assert!(matches!(result, Err(NavError::PathNotFound(_))));
    }

    #[test]
    fn test_vfs_walk() {
        let backend = MemoryBackend::new();
        backend.mkdir("/data").unwrap();
        backend.write("/data/x.csv", b"1").unwrap();
        let vfs = VfsProvider::new(vec![VfsConnection::new("box", Arc::new(backend))]);
        let controller = FileController::new(ProviderRegistry::new().with(Arc::new(vfs)));

        let resolver = PathResolver::new(&controller);
        let resolution = resolver.resolve_in("vfs", "pvfs://box/data/x.csv").unwrap();
        assert_eq!(resolution.entity.name, "x.csv");
        assert_eq!(resolution.steps, 3);

        assert!(matches!(resolver.resolve_in("vfs", "pvfs://other/data"), Err(NavError::PathNotFound(_))));
    }
}
