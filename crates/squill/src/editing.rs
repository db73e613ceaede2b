//! Glue between resolved key actions and the vim engine: named editor
//! actions become motions, operators, and mode changes on the
//! `EditorState`, and keys the router leaves unresolved fall through here
//! as raw editor input.

use squill_keys::KeyChord;
use squill_vim::{EditorState, Mode, Motion, Operator, Position, Range};

/// What an editor key produced, for the shell to react to (redraw, copy the
/// yank register to the clipboard, open the find prompt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    CursorMoved,
    TextChanged { yanked: Option<String> },
    Yanked(String),
    ModeChanged,
    /// A find/till motion is waiting for its target character.
    AwaitingChar,
    Ignored,
}

/// Stateful editor input handler; owns the pending find/till motion.
#[derive(Debug, Default)]
pub struct EditorInput {
    pending_find: Option<Motion>,
}

impl EditorInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch a named action resolved by the key router.
    pub fn handle_action(&mut self, editor: &mut EditorState, action: &str) -> EditorEvent {
        match action {
            "enter_insert_mode" => {
                editor.enter_insert();
                return EditorEvent::ModeChanged;
            }
            "exit_insert_mode" => {
                editor.exit_insert();
                return EditorEvent::ModeChanged;
            }
            "undo" => {
                return if editor.undo() {
                    EditorEvent::TextChanged { yanked: None }
                } else {
                    EditorEvent::Ignored
                };
            }
            "redo" => {
                return if editor.redo() {
                    EditorEvent::TextChanged { yanked: None }
                } else {
                    EditorEvent::Ignored
                };
            }
            "delete_line" => return self.line_operator(editor, Operator::Delete),
            "yank_line" => return self.line_operator(editor, Operator::Yank),
            "change_line" => return self.line_operator(editor, Operator::Change),
            "delete_char" => return self.char_operator(editor, false),
            "delete_char_back" => return self.char_operator(editor, true),
            _ => {}
        }

        if let Some(motion_name) = action.strip_prefix("motion_") {
            let Some(motion) = motion_by_name(motion_name) else {
                return EditorEvent::Ignored;
            };
            if motion.wants_char() {
                self.pending_find = Some(motion);
                return EditorEvent::AwaitingChar;
            }
            editor.apply_motion(motion, None);
            return EditorEvent::CursorMoved;
        }

        if let Some((op, motion_name)) = split_operator_action(action) {
            let Some(motion) = motion_by_name(motion_name) else {
                return EditorEvent::Ignored;
            };
            // Char-wanting operator motions arrive through
            // `handle_captured_char` once the router has the target.
            if motion.wants_char() {
                return EditorEvent::AwaitingChar;
            }
            return apply_operator_motion(editor, op, motion, None);
        }

        EditorEvent::Ignored
    }

    /// Dispatch a `CharCaptured` router result: the target character of a
    /// pending find/till, plain or under an operator.
    pub fn handle_captured_char(
        &mut self,
        editor: &mut EditorState,
        action: &str,
        ch: char,
    ) -> EditorEvent {
        if let Some(motion_name) = action.strip_prefix("motion_") {
            let Some(motion) = motion_by_name(motion_name) else {
                return EditorEvent::Ignored;
            };
            editor.apply_motion(motion, Some(ch));
            return EditorEvent::CursorMoved;
        }

        if let Some((op, motion_name)) = split_operator_action(action) {
            let Some(motion) = motion_by_name(motion_name) else {
                return EditorEvent::Ignored;
            };
            return apply_operator_motion(editor, op, motion, Some(ch));
        }

        EditorEvent::Ignored
    }

    /// Dispatch an `ObjectCaptured` router result (`di(`, `ya"`, `ciw`).
    pub fn handle_object(
        &mut self,
        editor: &mut EditorState,
        action: &str,
        obj: char,
        around: bool,
    ) -> EditorEvent {
        let Some(op) = operator_by_action(action) else {
            return EditorEvent::Ignored;
        };

        let yanked = editor.apply_operator_object(op, obj, around);
        if yanked.is_empty() {
            return EditorEvent::Ignored;
        }
        operator_event(op, yanked)
    }

    /// Keys the router left unresolved: motions in normal mode, raw input
    /// in insert mode.
    pub fn handle_unresolved(&mut self, editor: &mut EditorState, chord: &KeyChord) -> EditorEvent {
        if let Some(motion) = self.pending_find.take() {
            return match chord.printable() {
                Some(ch) => {
                    editor.apply_motion(motion, Some(ch));
                    EditorEvent::CursorMoved
                }
                None => EditorEvent::Ignored,
            };
        }

        match editor.mode {
            Mode::Insert => match chord.printable() {
                Some(ch) => {
                    editor.insert_char(ch);
                    EditorEvent::TextChanged { yanked: None }
                }
                None if chord.key == "enter" => {
                    editor.insert_char('\n');
                    EditorEvent::TextChanged { yanked: None }
                }
                None => EditorEvent::Ignored,
            },
            Mode::Normal => {
                let Some(ch) = chord.printable() else {
                    return EditorEvent::Ignored;
                };
                let Some(motion) = motion_by_key(ch) else {
                    return EditorEvent::Ignored;
                };
                if motion.wants_char() {
                    self.pending_find = Some(motion);
                    return EditorEvent::AwaitingChar;
                }
                editor.apply_motion(motion, None);
                EditorEvent::CursorMoved
            }
        }
    }

    fn line_operator(&self, editor: &mut EditorState, op: Operator) -> EditorEvent {
        let row = editor.cursor.row;
        let range = Range::linewise(Position::new(row, 0), Position::new(row, 0));
        let yanked = editor.apply_operator(op, range);
        operator_event(op, yanked)
    }

    fn char_operator(&self, editor: &mut EditorState, back: bool) -> EditorEvent {
        let cursor = editor.cursor;
        let range = if back {
            if cursor.col == 0 {
                return EditorEvent::Ignored;
            }
            Range::charwise(
                Position::new(cursor.row, cursor.col - 1),
                Position::new(cursor.row, cursor.col - 1),
                true,
            )
        } else {
            Range::charwise(cursor, cursor, true)
        };
        let yanked = editor.apply_operator(Operator::Delete, range);
        EditorEvent::TextChanged {
            yanked: Some(yanked),
        }
    }
}

fn operator_event(op: Operator, yanked: String) -> EditorEvent {
    match op {
        Operator::Yank => EditorEvent::Yanked(yanked),
        Operator::Delete | Operator::Change => EditorEvent::TextChanged {
            yanked: Some(yanked),
        },
    }
}

fn apply_operator_motion(
    editor: &mut EditorState,
    op: Operator,
    motion: Motion,
    arg: Option<char>,
) -> EditorEvent {
    let yanked = editor.apply_operator_motion(op, motion, arg);
    operator_event(op, yanked)
}

fn operator_by_action(action: &str) -> Option<Operator> {
    match action {
        "delete_object" => Some(Operator::Delete),
        "yank_object" => Some(Operator::Yank),
        "change_object" => Some(Operator::Change),
        _ => None,
    }
}

fn split_operator_action(action: &str) -> Option<(Operator, &str)> {
    if let Some(rest) = action.strip_prefix("delete_") {
        return Some((Operator::Delete, rest));
    }
    if let Some(rest) = action.strip_prefix("yank_") {
        return Some((Operator::Yank, rest));
    }
    if let Some(rest) = action.strip_prefix("change_") {
        return Some((Operator::Change, rest));
    }
    None
}

fn motion_by_name(name: &str) -> Option<Motion> {
    let motion = match name {
        "left" => Motion::Left,
        "down" => Motion::Down,
        "up" => Motion::Up,
        "right" => Motion::Right,
        "word" => Motion::WordForward,
        "WORD" => Motion::BigWordForward,
        "word_back" => Motion::WordBack,
        "WORD_back" => Motion::BigWordBack,
        "word_end" => Motion::WordEnd,
        "WORD_end" => Motion::BigWordEnd,
        "word_end_back" => Motion::WordEndBack,
        "WORD_end_back" => Motion::BigWordEndBack,
        "line_start" => Motion::LineStart,
        "line_end" => Motion::LineEnd,
        "file_start" => Motion::FileStart,
        "file_end" | "to_end" => Motion::FileEnd,
        "matching_bracket" => Motion::MatchingBracket,
        "find_char" => Motion::FindForward,
        "find_char_back" => Motion::FindBack,
        "till_char" => Motion::TillForward,
        "till_char_back" => Motion::TillBack,
        _ => return None,
    };
    Some(motion)
}

fn motion_by_key(ch: char) -> Option<Motion> {
    let motion = match ch {
        'h' => Motion::Left,
        'j' => Motion::Down,
        'k' => Motion::Up,
        'l' => Motion::Right,
        'w' => Motion::WordForward,
        'W' => Motion::BigWordForward,
        'b' => Motion::WordBack,
        'B' => Motion::BigWordBack,
        'e' => Motion::WordEnd,
        'E' => Motion::BigWordEnd,
        '0' => Motion::LineStart,
        '$' => Motion::LineEnd,
        'G' => Motion::FileEnd,
        '%' => Motion::MatchingBracket,
        'f' => Motion::FindForward,
        'F' => Motion::FindBack,
        't' => Motion::TillForward,
        'T' => Motion::TillBack,
        _ => return None,
    };
    Some(motion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use squill_keys::{FocusPane, InputContext, KeyDispatch, KeyRouter, default_keymap};

    fn query_ctx() -> InputContext {
        InputContext {
            focus: FocusPane::Query,
            ..Default::default()
        }
    }

    /// Feed a chord through router + editor glue, as the shell does.
    fn press(
        router: &mut KeyRouter,
        input: &mut EditorInput,
        editor: &mut EditorState,
        key: &str,
    ) -> EditorEvent {
        let ctx = query_ctx();
        let chord = KeyChord::plain(key);
        match router.resolve_key(&chord, &ctx, &|_| true) {
            KeyDispatch::Action(action) => input.handle_action(editor, &action),
            KeyDispatch::CharCaptured { action, ch } => {
                input.handle_captured_char(editor, &action, ch)
            }
            KeyDispatch::ObjectCaptured { action, obj, around } => {
                input.handle_object(editor, &action, obj, around)
            }
            KeyDispatch::Unhandled => input.handle_unresolved(editor, &chord),
            KeyDispatch::MenuOpened(_) => EditorEvent::Ignored,
            KeyDispatch::Cancelled => EditorEvent::Ignored,
        }
    }

    #[test]
    fn motion_keys_fall_through_to_the_editor() {
        let mut router = KeyRouter::new(default_keymap());
        let mut input = EditorInput::new();
        let mut editor = EditorState::new("alpha beta gamma");

        press(&mut router, &mut input, &mut editor, "w");
        assert_eq!(editor.cursor, Position::new(0, 6));
        press(&mut router, &mut input, &mut editor, "w");
        assert_eq!(editor.cursor, Position::new(0, 11));
        press(&mut router, &mut input, &mut editor, "b");
        assert_eq!(editor.cursor, Position::new(0, 6));
        press(&mut router, &mut input, &mut editor, "e");
        assert_eq!(editor.cursor, Position::new(0, 9));
        press(&mut router, &mut input, &mut editor, "$");
        assert_eq!(editor.cursor, Position::new(0, 16));
    }

    #[test]
    fn delete_inner_parens_via_key_sequence() {
        let mut router = KeyRouter::new(default_keymap());
        let mut input = EditorInput::new();
        let mut editor = EditorState::new("foo (bar baz) qux");
        editor.cursor = Position::new(0, 6);

        press(&mut router, &mut input, &mut editor, "d");
        press(&mut router, &mut input, &mut editor, "i");
        let event = press(&mut router, &mut input, &mut editor, "(");

        assert_eq!(
            event,
            EditorEvent::TextChanged {
                yanked: Some("bar baz".into())
            }
        );
        assert_eq!(editor.text, "foo () qux");
        assert_eq!(editor.cursor, Position::new(0, 5));
    }

    #[test]
    fn delete_word_via_menu() {
        let mut router = KeyRouter::new(default_keymap());
        let mut input = EditorInput::new();
        let mut editor = EditorState::new("alpha beta");

        press(&mut router, &mut input, &mut editor, "d");
        let event = press(&mut router, &mut input, &mut editor, "w");

        assert_eq!(
            event,
            EditorEvent::TextChanged {
                yanked: Some("alpha ".into())
            }
        );
        assert_eq!(editor.text, "beta");
    }

    #[test]
    fn find_char_waits_for_target() {
        let mut router = KeyRouter::new(default_keymap());
        let mut input = EditorInput::new();
        let mut editor = EditorState::new("select * from t");

        let event = press(&mut router, &mut input, &mut editor, "f");
        assert_eq!(event, EditorEvent::AwaitingChar);

        press(&mut router, &mut input, &mut editor, "m");
        assert_eq!(editor.cursor, Position::new(0, 12));
    }

    #[test]
    fn insert_mode_types_text() {
        let mut router = KeyRouter::new(default_keymap());
        let mut input = EditorInput::new();
        let mut editor = EditorState::new("");

        press(&mut router, &mut input, &mut editor, "i");
        assert_eq!(editor.mode, Mode::Insert);

        for key in ["s", "e", "l"] {
            press(&mut router, &mut input, &mut editor, key);
        }
        assert_eq!(editor.text, "sel");

        // Escape returns to normal mode.
        let ctx = query_ctx();
        let chord = KeyChord::parse("escape").unwrap();
        let mut router2 = router;
        if let KeyDispatch::Action(action) = router2.resolve_key(&chord, &ctx, &|_| true) {
            input.handle_action(&mut editor, &action);
        }
        assert_eq!(editor.mode, Mode::Normal);
    }

    #[test]
    fn undo_after_delete_line() {
        let mut router = KeyRouter::new(default_keymap());
        let mut input = EditorInput::new();
        let mut editor = EditorState::new("one\ntwo");
        editor.cursor = Position::new(1, 0);

        press(&mut router, &mut input, &mut editor, "d");
        press(&mut router, &mut input, &mut editor, "d");
        assert_eq!(editor.text, "one");

        press(&mut router, &mut input, &mut editor, "u");
        assert_eq!(editor.text, "one\ntwo");
    }
}
