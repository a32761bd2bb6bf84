//! Clipboard for copy/cut/paste between directories and providers

use std::sync::Arc;

use crate::entity::Entity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClipboardMode {
    #[default]
    Copy,
    /// Sources are deleted once pasted
    Cut,
}

#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    mode: ClipboardMode,
    items: Vec<Arc<Entity>>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with `items` to be copied
    pub fn copy(&mut self, items: Vec<Arc<Entity>>) {
        self.mode = ClipboardMode::Copy;
        self.items = items;
    }

    /// Replace the contents with `items` to be moved
    pub fn cut(&mut self, items: Vec<Arc<Entity>>) {
        self.mode = ClipboardMode::Cut;
        self.items = items;
    }

    pub fn clear(&mut self) {
        self.mode = ClipboardMode::Copy;
        self.items.clear();
    }

    pub fn mode(&self) -> ClipboardMode {
        self.mode
    }

    pub fn items(&self) -> &[Arc<Entity>] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_then_clear() {
        let mut clipboard = Clipboard::new();
        clipboard.cut(vec![Arc::new(Entity::file("local", "/a", "a"))]);
        assert_eq!(clipboard.mode(), ClipboardMode::Cut);
        assert_eq!(clipboard.items().len(), 1);
        clipboard.clear();
        assert!(clipboard.is_empty());
        assert_eq!(clipboard.mode(), ClipboardMode::Copy);
    }
}
