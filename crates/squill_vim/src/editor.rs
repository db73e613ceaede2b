use crate::motions::{self, Motion};
use crate::operators::{self, OperatorResult};
use crate::text_objects;
use crate::types::{Position, Range, normalize_position};
use crate::undo::{Snapshot, UndoHistory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Insert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Delete,
    Yank,
    Change,
}

/// Editor state for the query buffer: text, cursor, mode, and undo history.
///
/// Mutating entry points snapshot the pre-state so every operator is a
/// single undo step. Motions never touch history.
#[derive(Debug, Default)]
pub struct EditorState {
    pub text: String,
    pub cursor: Position,
    pub selection: Option<Range>,
    pub mode: Mode,
    history: UndoHistory,
}

impl EditorState {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn enter_insert(&mut self) {
        self.mode = Mode::Insert;
    }

    pub fn exit_insert(&mut self) {
        self.mode = Mode::Normal;
        self.cursor = normalize_position(&self.text, self.cursor.row, self.cursor.col);
    }

    /// Move the cursor by a motion. Pure; no text change, no history.
    pub fn apply_motion(&mut self, motion: Motion, arg: Option<char>) {
        let result = motions::apply(motion, &self.text, self.cursor.row, self.cursor.col, arg);
        self.cursor = result.position;
    }

    /// Apply an operator over an explicit range. Returns the yanked text.
    pub fn apply_operator(&mut self, op: Operator, range: Range) -> String {
        let result = match op {
            Operator::Delete => operators::delete(&self.text, range),
            Operator::Yank => operators::yank(&self.text, range),
            Operator::Change => operators::change(&self.text, range),
        };
        self.commit(op, result)
    }

    /// Operator composed with a motion from the cursor (`dw`, `y$`, `cG`).
    pub fn apply_operator_motion(
        &mut self,
        op: Operator,
        motion: Motion,
        arg: Option<char>,
    ) -> String {
        let range = operators::motion_range(
            &self.text,
            self.cursor.row,
            self.cursor.col,
            motion,
            arg,
        );
        self.apply_operator(op, range)
    }

    /// Operator over a text object (`di(`, `ya"`, `ciw`). No-op when the
    /// object does not exist at the cursor.
    pub fn apply_operator_object(&mut self, op: Operator, obj: char, around: bool) -> String {
        let object = text_objects::text_object(
            obj,
            &self.text,
            self.cursor.row,
            self.cursor.col,
            around,
        );
        match object {
            Some(range) => self.apply_operator(op, range),
            None => String::new(),
        }
    }

    fn commit(&mut self, op: Operator, result: OperatorResult) -> String {
        // Yank mutates nothing; no undo step.
        if op != Operator::Yank {
            self.history
                .push(Snapshot::new(self.text.clone(), self.cursor));
            self.text = result.text;
        }
        self.cursor = result.cursor;
        if result.enter_insert {
            self.mode = Mode::Insert;
        }
        result.yanked
    }

    /// Insert a character at the cursor (insert mode).
    pub fn insert_char(&mut self, ch: char) {
        self.history
            .push(Snapshot::new(self.text.clone(), self.cursor));
        let idx = char_index(&self.text, self.cursor);
        let mut chars: Vec<char> = self.text.chars().collect();
        chars.insert(idx, ch);
        self.text = chars.into_iter().collect();

        if ch == '\n' {
            self.cursor = Position::new(self.cursor.row + 1, 0);
        } else {
            self.cursor = Position::new(self.cursor.row, self.cursor.col + 1);
        }
    }

    pub fn undo(&mut self) -> bool {
        let current = Snapshot::new(self.text.clone(), self.cursor);
        match self.history.undo(current) {
            Some(snapshot) => {
                self.text = snapshot.text;
                self.cursor = snapshot.cursor;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let current = Snapshot::new(self.text.clone(), self.cursor);
        match self.history.redo(current) {
            Some(snapshot) => {
                self.text = snapshot.text;
                self.cursor = snapshot.cursor;
                true
            }
            None => false,
        }
    }
}

fn char_index(text: &str, pos: Position) -> usize {
    let pos = normalize_position(text, pos.row, pos.col);
    let mut idx = 0;
    for (row, line) in text.split('\n').enumerate() {
        if row == pos.row {
            return idx + pos.col;
        }
        idx += line.chars().count() + 1;
    }
    idx
}
