//! Back/forward navigation history

use tracing::trace;

use crate::entity::Node;

/// Where a selection came from.
///
/// Only user selections are recorded; replaying history produces
/// `History` events, which must not push new entries.
#[derive(Debug, Clone)]
pub enum SelectionEvent {
    User(Node),
    History(Node),
}

impl SelectionEvent {
    pub fn node(&self) -> &Node {
        match self {
            SelectionEvent::User(node) | SelectionEvent::History(node) => node,
        }
    }
}

/// Linear history of visited nodes with a cursor
#[derive(Debug, Clone)]
pub struct NavigationHistory {
    /// Entries (oldest first)
    entries: Vec<Node>,
    /// Index of the current entry (None = nothing visited yet)
    index: Option<usize>,
    /// Maximum number of entries kept
    limit: usize,
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

impl NavigationHistory {
    pub fn new(limit: usize) -> Self {
        Self { entries: Vec::new(), index: None, limit: limit.max(1) }
    }

    /// Feed a selection event; returns whether an entry was recorded
    pub fn observe(&mut self, event: &SelectionEvent) -> bool {
        match event {
            SelectionEvent::User(node) => self.record(node.clone()),
            SelectionEvent::History(_) => false,
        }
    }

    /// Record a user selection.
    ///
    /// Anything after the current entry is discarded first; selecting the
    /// node that is already current records nothing.
    pub fn record(&mut self, node: Node) -> bool {
        if self.current().is_some_and(|current| current.same_node(&node)) {
            return false;
        }
        if let Some(idx) = self.index {
            self.entries.truncate(idx + 1);
        }
        self.entries.push(node);
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
        self.index = Some(self.entries.len() - 1);
        trace!(len = self.entries.len(), "history recorded");
        true
    }

    pub fn current(&self) -> Option<&Node> {
        self.index.and_then(|idx| self.entries.get(idx))
    }

    pub fn can_go_back(&self) -> bool {
        self.index.is_some_and(|idx| idx > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.index.is_some_and(|idx| idx + 1 < self.entries.len())
    }

    /// Step back; the returned node should be re-selected as a `History` event
    pub fn back(&mut self) -> Option<Node> {
        match self.index {
            Some(idx) if idx > 0 => {
                self.index = Some(idx - 1);
                self.current().cloned()
            }
            _ => None,
        }
    }

    /// Step forward; the returned node should be re-selected as a `History` event
    pub fn forward(&mut self) -> Option<Node> {
        match self.index {
            Some(idx) if idx + 1 < self.entries.len() => {
                self.index = Some(idx + 1);
                self.current().cloned()
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Visited nodes, oldest first
    pub fn entries(&self) -> &[Node] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use std::sync::Arc;

    fn node(path: &str) -> Node {
        Node::from(Arc::new(Entity::directory("local", path, path.trim_start_matches('/'))))
    }

    #[test]
    fn test_back_forward_and_truncate() {
        let mut history = NavigationHistory::new(10);
        history.record(node("/a"));
        history.record(node("/b"));
        history.record(node("/c"));

        assert_eq!(history.back().and_then(|n| n.match_path().map(str::to_string)).as_deref(), Some("/b"));
        assert_eq!(history.back().and_then(|n| n.match_path().map(str::to_string)).as_deref(), Some("/a"));
        assert!(!history.can_go_back());
        assert!(history.can_go_forward());
        assert!(history.back().is_none());

        history.record(node("/d"));
        let paths: Vec<&str> = history.entries().iter().filter_map(|n| n.match_path()).collect();
        assert_eq!(paths, vec!["/a", "/d"]);
        assert!(!history.can_go_forward());
    }

    #[test]
    fn test_history_events_are_not_recorded() {
        let mut history = NavigationHistory::new(10);
        assert!(history.observe(&SelectionEvent::User(node("/a"))));
        assert!(history.observe(&SelectionEvent::User(node("/b"))));
        let back = history.back().unwrap();
        assert!(!history.observe(&SelectionEvent::History(back)));
        assert_eq!(history.len(), 2);
        assert!(history.can_go_forward());
    }

    #[test]
    fn test_same_node_twice_records_once() {
        let mut history = NavigationHistory::new(10);
        assert!(history.record(node("/a")));
        assert!(!history.record(node("/a")));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = NavigationHistory::new(2);
        history.record(node("/a"));
        history.record(node("/b"));
        history.record(node("/c"));
        let paths: Vec<&str> = history.entries().iter().filter_map(|n| n.match_path()).collect();
        assert_eq!(paths, vec!["/b", "/c"]);
        assert!(history.can_go_back());
    }
}
