//! The keyboard front door: one place where a keypress meets the state
//! machine, the router, and the editor glue.

use crate::editing::{EditorEvent, EditorInput};
use squill_keys::{
    InputContext, KeyChord, KeyDispatch, KeyRouter, StateMachine, default_keymap,
    default_state_machine,
};
use squill_vim::EditorState;

/// What the shell should do with a keypress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// A non-editor action for the shell to execute (connect, run query,
    /// focus change, ...).
    Action(String),
    /// The key was consumed by the editor.
    Editor(EditorEvent),
    /// A pending menu opened or advanced; the footer shows its entries.
    MenuOpen(String),
    /// Nothing consumed the key.
    Ignored,
}

/// Owns the router, the state machine, and the editor input glue.
pub struct KeyHandler {
    router: KeyRouter,
    machine: StateMachine,
    input: EditorInput,
}

impl KeyHandler {
    pub fn new() -> Self {
        Self {
            router: KeyRouter::new(default_keymap()),
            machine: default_state_machine(),
            input: EditorInput::new(),
        }
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn pending_menu(&self) -> Option<&str> {
        self.router.pending_menu()
    }

    /// Route one keypress. Editor-shaped dispatches are applied to
    /// `editor`; everything else comes back as an action for the shell.
    pub fn handle_key(
        &mut self,
        chord: &KeyChord,
        ctx: &InputContext,
        editor: &mut EditorState,
    ) -> KeyOutcome {
        let machine = &self.machine;
        let allowed = |action: &str| {
            machine.check_action(ctx, action) != squill_keys::Verdict::Forbidden
        };

        match self.router.resolve_key(chord, ctx, &allowed) {
            KeyDispatch::Action(action) => {
                // Editor actions are applied here; the rest go to the shell.
                match self.input.handle_action(editor, &action) {
                    EditorEvent::Ignored => KeyOutcome::Action(action),
                    event => KeyOutcome::Editor(event),
                }
            }
            KeyDispatch::CharCaptured { action, ch } => {
                KeyOutcome::Editor(self.input.handle_captured_char(editor, &action, ch))
            }
            KeyDispatch::ObjectCaptured { action, obj, around } => {
                KeyOutcome::Editor(self.input.handle_object(editor, &action, obj, around))
            }
            KeyDispatch::MenuOpened(menu) => KeyOutcome::MenuOpen(menu),
            KeyDispatch::Cancelled => KeyOutcome::Ignored,
            KeyDispatch::Unhandled => {
                if ctx.focus == squill_keys::FocusPane::Query {
                    match self.input.handle_unresolved(editor, chord) {
                        EditorEvent::Ignored => KeyOutcome::Ignored,
                        event => KeyOutcome::Editor(event),
                    }
                } else {
                    KeyOutcome::Ignored
                }
            }
        }
    }
}

impl Default for KeyHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squill_keys::{FocusPane, VimMode};
    use squill_vim::Position;

    fn query_ctx() -> InputContext {
        InputContext {
            focus: FocusPane::Query,
            ..Default::default()
        }
    }

    #[test]
    fn execute_resolves_to_a_shell_action() {
        let mut handler = KeyHandler::new();
        let mut editor = EditorState::new("SELECT 1");

        let outcome = handler.handle_key(&KeyChord::plain("enter"), &query_ctx(), &mut editor);
        assert_eq!(outcome, KeyOutcome::Action("execute_query".into()));
    }

    #[test]
    fn execute_is_fenced_while_a_query_runs() {
        let mut handler = KeyHandler::new();
        let mut editor = EditorState::new("SELECT 1");

        let ctx = InputContext {
            focus: FocusPane::Query,
            query_executing: true,
            ..Default::default()
        };
        let outcome = handler.handle_key(&KeyChord::plain("enter"), &ctx, &mut editor);
        assert_eq!(outcome, KeyOutcome::Ignored);

        // Cancel stays reachable.
        let outcome = handler.handle_key(&KeyChord::parse("ctrl+z").unwrap(), &ctx, &mut editor);
        assert_eq!(outcome, KeyOutcome::Action("cancel_operation".into()));
    }

    #[test]
    fn space_types_a_space_in_insert_mode() {
        let mut handler = KeyHandler::new();
        let mut editor = EditorState::new("");

        // Enter insert mode through the key path.
        let outcome = handler.handle_key(&KeyChord::plain("i"), &query_ctx(), &mut editor);
        assert!(matches!(outcome, KeyOutcome::Editor(EditorEvent::ModeChanged)));

        let ctx = InputContext {
            focus: FocusPane::Query,
            vim_mode: VimMode::Insert,
            ..Default::default()
        };
        let outcome = handler.handle_key(&KeyChord::plain("space"), &ctx, &mut editor);
        assert!(matches!(outcome, KeyOutcome::Editor(EditorEvent::TextChanged { .. })));
        assert_eq!(editor.text, " ");
    }

    #[test]
    fn leader_quit_flow() {
        let mut handler = KeyHandler::new();
        let mut editor = EditorState::new("");

        let outcome = handler.handle_key(&KeyChord::plain("space"), &query_ctx(), &mut editor);
        assert_eq!(outcome, KeyOutcome::MenuOpen("leader".into()));
        assert_eq!(handler.pending_menu(), Some("leader"));

        let outcome = handler.handle_key(&KeyChord::plain("q"), &query_ctx(), &mut editor);
        assert_eq!(outcome, KeyOutcome::Action("quit".into()));
    }

    #[test]
    fn operator_motion_edits_through_the_full_stack() {
        let mut handler = KeyHandler::new();
        let mut editor = EditorState::new("foo (bar baz) qux");
        editor.cursor = Position::new(0, 6);

        handler.handle_key(&KeyChord::plain("d"), &query_ctx(), &mut editor);
        handler.handle_key(&KeyChord::plain("i"), &query_ctx(), &mut editor);
        let outcome = handler.handle_key(&KeyChord::plain("("), &query_ctx(), &mut editor);

        assert_eq!(
            outcome,
            KeyOutcome::Editor(EditorEvent::TextChanged {
                yanked: Some("bar baz".into())
            })
        );
        assert_eq!(editor.text, "foo () qux");
    }
}
