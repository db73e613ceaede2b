use crate::types::Position;
use std::collections::VecDeque;

/// One editor state worth restoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub text: String,
    pub cursor: Position,
}

impl Snapshot {
    pub fn new(text: impl Into<String>, cursor: Position) -> Self {
        Self {
            text: text.into(),
            cursor,
        }
    }
}

/// Bounded undo/redo stack.
///
/// Operators push the pre-state before applying. A fresh push truncates the
/// redo tail; depth is capped by dropping the oldest snapshots.
#[derive(Debug, Default)]
pub struct UndoHistory {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    max_depth: usize,
}

impl UndoHistory {
    pub const DEFAULT_MAX_DEPTH: usize = 200;

    pub fn new() -> Self {
        Self::with_depth(Self::DEFAULT_MAX_DEPTH)
    }

    pub fn with_depth(max_depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.redo.clear();
        self.undo.push_back(snapshot);
        while self.undo.len() > self.max_depth {
            self.undo.pop_front();
        }
    }

    /// Rewind one step. `current` is saved for redo.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let snapshot = self.undo.pop_back()?;
        self.redo.push(current);
        Some(snapshot)
    }

    /// Re-apply one undone step. `current` goes back on the undo stack.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let snapshot = self.redo.pop()?;
        self.undo.push_back(current);
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(text: &str) -> Snapshot {
        Snapshot::new(text, Position::default())
    }

    #[test]
    fn undo_restores_pushed_state() {
        let mut history = UndoHistory::new();
        history.push(snap("before"));

        let restored = history.undo(snap("after")).unwrap();
        assert_eq!(restored.text, "before");
    }

    #[test]
    fn redo_after_undo_is_identity() {
        let mut history = UndoHistory::new();
        history.push(snap("v1"));

        let restored = history.undo(snap("v2")).unwrap();
        assert_eq!(restored.text, "v1");

        let redone = history.redo(restored).unwrap();
        assert_eq!(redone.text, "v2");

        // And back again.
        let restored = history.undo(redone).unwrap();
        assert_eq!(restored.text, "v1");
    }

    #[test]
    fn push_truncates_redo_tail() {
        let mut history = UndoHistory::new();
        history.push(snap("v1"));
        let _ = history.undo(snap("v2"));
        assert!(history.can_redo());

        history.push(snap("v3"));
        assert!(!history.can_redo());
    }

    #[test]
    fn depth_is_bounded() {
        let mut history = UndoHistory::with_depth(3);
        for i in 0..10 {
            history.push(snap(&format!("v{}", i)));
        }

        let mut texts = Vec::new();
        let mut current = snap("current");
        while let Some(s) = history.undo(current.clone()) {
            texts.push(s.text.clone());
            current = s;
        }

        assert_eq!(texts, vec!["v9", "v8", "v7"]);
    }

    #[test]
    fn undo_on_empty_history_is_none() {
        let mut history = UndoHistory::new();
        assert!(history.undo(snap("x")).is_none());
        assert!(history.redo(snap("x")).is_none());
    }
}
