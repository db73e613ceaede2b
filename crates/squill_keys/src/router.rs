//! Key router: chord -> named action, given the input context, with leader
//! menus and vim pending modes layered on top.

use crate::chord::KeyChord;
use crate::context::{Guard, InputContext, KeyContext};
use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A key binding scoped to a context subset. An empty scope means the
/// binding applies in any active context.
#[derive(Debug, Clone)]
pub struct Binding {
    pub chord: KeyChord,
    pub action: String,
    pub contexts: Vec<KeyContext>,
    pub guard: Option<Guard>,
}

/// One entry of a leader menu.
#[derive(Debug, Clone)]
pub struct LeaderCommand {
    pub key: char,
    pub action: String,
    pub label: String,
    pub category: String,
    pub guard: Option<Guard>,
}

/// All bindings: direct chords plus the leader menu tables.
#[derive(Debug, Default)]
pub struct Keymap {
    bindings: Vec<Binding>,
    menus: HashMap<String, Vec<LeaderCommand>>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(
        &mut self,
        chord: KeyChord,
        action: &str,
        contexts: &[KeyContext],
        guard: Option<Guard>,
    ) {
        self.bindings.push(Binding {
            chord,
            action: action.to_string(),
            contexts: contexts.to_vec(),
            guard,
        });
    }

    pub fn add_menu_command(&mut self, menu: &str, command: LeaderCommand) {
        self.menus.entry(menu.to_string()).or_default().push(command);
    }

    pub fn menu(&self, menu: &str) -> &[LeaderCommand] {
        self.menus.get(menu).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All chords bound to an action, for footer labels.
    pub fn chords_for(&self, action: &str) -> Vec<&KeyChord> {
        self.bindings
            .iter()
            .filter(|b| b.action == action)
            .map(|b| &b.chord)
            .collect()
    }

    fn matching<'a>(
        &'a self,
        chord: &'a KeyChord,
        active: &'a [KeyContext],
    ) -> impl Iterator<Item = &'a Binding> + 'a {
        // Context-specific bindings resolve before unscoped ones, in the
        // order the contexts are active (most specific first).
        let mut matches: Vec<&Binding> = self
            .bindings
            .iter()
            .filter(|b| {
                b.chord == *chord
                    && (b.contexts.is_empty() || b.contexts.iter().any(|c| active.contains(c)))
            })
            .collect();

        matches.sort_by_key(|b| {
            b.contexts
                .iter()
                .filter_map(|c| active.iter().position(|a| a == c))
                .min()
                .unwrap_or(usize::MAX)
        });

        matches.into_iter()
    }
}

/// What a keypress resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDispatch {
    /// A named action, to be executed by the shell.
    Action(String),
    /// A leader menu opened; the next key selects from it.
    MenuOpened(String),
    /// A pending `f`/`F`/`t`/`T` captured its target character.
    CharCaptured { action: String, ch: char },
    /// A pending `i`/`a` captured its text object.
    ObjectCaptured {
        action: String,
        obj: char,
        around: bool,
    },
    /// A pending sequence was cancelled (escape, unknown key, timeout).
    Cancelled,
    /// Nothing matched; the key falls through to the focused widget.
    Unhandled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    None,
    /// Leader (or operator) menu is open.
    Menu { menu: String, opened: Instant },
    /// Waiting for the target character of a find/till action.
    Char { action: String, opened: Instant },
    /// Waiting for a text object character after `i`/`a`.
    Object {
        action: String,
        around: bool,
        opened: Instant,
    },
}

const TEXT_OBJECT_CHARS: &[char] = &[
    'w', 'W', '"', '\'', '`', '(', ')', '[', ']', '{', '}', 'b', 'B',
];

/// Actions with router-internal behavior: they open pending states instead
/// of dispatching to the shell.
const ACTION_LEADER: &str = "leader_key";
const MENU_PREFIX: &str = "open_menu:";
const CHAR_PREFIX: &str = "char:";
const OBJECT_INNER: &str = "inner";
const OBJECT_AROUND: &str = "around";

/// Resolves chords to actions and owns the pending-mode state machine.
///
/// The pending timeout (default 1s) is checked lazily on every resolve and
/// via `expire_pending` from the shell's tick.
pub struct KeyRouter {
    keymap: Keymap,
    pending: Pending,
    timeout: Duration,
}

impl KeyRouter {
    pub fn new(keymap: Keymap) -> Self {
        Self {
            keymap,
            pending: Pending::None,
            timeout: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    /// Menu id of the open pending menu, for the footer overlay.
    pub fn pending_menu(&self) -> Option<&str> {
        match &self.pending {
            Pending::Menu { menu, .. } => Some(menu),
            _ => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending != Pending::None
    }

    /// Drop an expired pending state. Returns true when one expired.
    pub fn expire_pending(&mut self, now: Instant) -> bool {
        let opened = match &self.pending {
            Pending::None => return false,
            Pending::Menu { opened, .. }
            | Pending::Char { opened, .. }
            | Pending::Object { opened, .. } => *opened,
        };

        if now.duration_since(opened) >= self.timeout {
            debug!("pending key state timed out");
            self.pending = Pending::None;
            true
        } else {
            false
        }
    }

    /// Resolve one keypress.
    ///
    /// `is_allowed` is the state machine's verdict for a named action; a
    /// binding whose action is not allowed falls through to the next
    /// matching binding.
    pub fn resolve_key(
        &mut self,
        chord: &KeyChord,
        ctx: &InputContext,
        is_allowed: &dyn Fn(&str) -> bool,
    ) -> KeyDispatch {
        let now = Instant::now();
        self.expire_pending(now);

        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Menu { menu, .. } => self.resolve_menu_key(&menu, chord, ctx, is_allowed, now),
            Pending::Char { action, .. } => match chord.printable() {
                Some(ch) => KeyDispatch::CharCaptured { action, ch },
                None => KeyDispatch::Cancelled,
            },
            Pending::Object { action, around, .. } => match chord.printable() {
                Some(ch) if TEXT_OBJECT_CHARS.contains(&ch) => KeyDispatch::ObjectCaptured {
                    action,
                    obj: ch,
                    around,
                },
                _ => KeyDispatch::Cancelled,
            },
            Pending::None => self.resolve_direct(chord, ctx, is_allowed, now),
        }
    }

    fn resolve_direct(
        &mut self,
        chord: &KeyChord,
        ctx: &InputContext,
        is_allowed: &dyn Fn(&str) -> bool,
        now: Instant,
    ) -> KeyDispatch {
        let active = ctx.active_contexts();

        let mut chosen = None;
        for binding in self.keymap.matching(chord, &active) {
            if let Some(guard) = &binding.guard
                && !guard.check(ctx)
            {
                continue;
            }
            if !is_allowed(&binding.action) {
                // Fall through to the next matching binding.
                continue;
            }
            chosen = Some(binding.action.clone());
            break;
        }

        match chosen {
            Some(action) => self.dispatch_action(&action, now),
            None => KeyDispatch::Unhandled,
        }
    }

    fn dispatch_action(&mut self, action: &str, now: Instant) -> KeyDispatch {
        if action == ACTION_LEADER {
            self.pending = Pending::Menu {
                menu: "leader".to_string(),
                opened: now,
            };
            return KeyDispatch::MenuOpened("leader".to_string());
        }

        if let Some(menu) = action.strip_prefix(MENU_PREFIX) {
            self.pending = Pending::Menu {
                menu: menu.to_string(),
                opened: now,
            };
            return KeyDispatch::MenuOpened(menu.to_string());
        }

        KeyDispatch::Action(action.to_string())
    }

    fn resolve_menu_key(
        &mut self,
        menu: &str,
        chord: &KeyChord,
        ctx: &InputContext,
        is_allowed: &dyn Fn(&str) -> bool,
        now: Instant,
    ) -> KeyDispatch {
        if chord.key == "escape" {
            return KeyDispatch::Cancelled;
        }

        let Some(ch) = chord.printable() else {
            return KeyDispatch::Cancelled;
        };

        let command = self
            .keymap
            .menu(menu)
            .iter()
            .find(|c| c.key == ch)
            .cloned();

        let Some(command) = command else {
            return KeyDispatch::Cancelled;
        };

        if let Some(guard) = &command.guard
            && !guard.check(ctx)
        {
            return KeyDispatch::Cancelled;
        }

        // Operator menus compose: `d` then `f` waits for a character,
        // `d` then `i` waits for a text object.
        match command.action.as_str() {
            OBJECT_INNER => {
                self.pending = Pending::Object {
                    action: format!("{}_object", menu),
                    around: false,
                    opened: now,
                };
                return KeyDispatch::MenuOpened(format!("{}:inner", menu));
            }
            OBJECT_AROUND => {
                self.pending = Pending::Object {
                    action: format!("{}_object", menu),
                    around: true,
                    opened: now,
                };
                return KeyDispatch::MenuOpened(format!("{}:around", menu));
            }
            _ => {}
        }

        if let Some(char_action) = command.action.strip_prefix(CHAR_PREFIX) {
            self.pending = Pending::Char {
                action: char_action.to_string(),
                opened: now,
            };
            return KeyDispatch::MenuOpened(format!("{}:char", menu));
        }

        if !is_allowed(&command.action) {
            return KeyDispatch::Cancelled;
        }

        self.dispatch_action(&command.action, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_keymap;

    fn allow_all(_: &str) -> bool {
        true
    }

    fn router() -> KeyRouter {
        KeyRouter::new(default_keymap())
    }

    fn query_normal_ctx() -> InputContext {
        InputContext {
            focus: crate::context::FocusPane::Query,
            ..Default::default()
        }
    }

    #[test]
    fn direct_binding_resolves() {
        let mut router = router();
        let ctx = query_normal_ctx();
        let dispatch = router.resolve_key(&KeyChord::plain("i"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::Action("enter_insert_mode".into()));
    }

    #[test]
    fn space_opens_leader_menu_and_next_key_selects() {
        let mut router = router();
        let ctx = query_normal_ctx();

        let dispatch = router.resolve_key(&KeyChord::plain("space"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::MenuOpened("leader".into()));
        assert!(router.has_pending());

        let dispatch = router.resolve_key(&KeyChord::plain("q"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::Action("quit".into()));
        assert!(!router.has_pending());
    }

    #[test]
    fn escape_cancels_pending_menu() {
        let mut router = router();
        let ctx = query_normal_ctx();

        router.resolve_key(&KeyChord::plain("space"), &ctx, &allow_all);
        let dispatch = router.resolve_key(&KeyChord::parse("escape").unwrap(), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::Cancelled);
        assert!(!router.has_pending());
    }

    #[test]
    fn unknown_menu_key_cancels() {
        let mut router = router();
        let ctx = query_normal_ctx();

        router.resolve_key(&KeyChord::plain("space"), &ctx, &allow_all);
        let dispatch = router.resolve_key(&KeyChord::plain("Z"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::Cancelled);
    }

    #[test]
    fn delete_menu_composes_with_text_object() {
        let mut router = router();
        let ctx = query_normal_ctx();

        let dispatch = router.resolve_key(&KeyChord::plain("d"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::MenuOpened("delete".into()));

        let dispatch = router.resolve_key(&KeyChord::plain("i"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::MenuOpened("delete:inner".into()));

        let dispatch = router.resolve_key(&KeyChord::plain("("), &ctx, &allow_all);
        assert_eq!(
            dispatch,
            KeyDispatch::ObjectCaptured {
                action: "delete_object".into(),
                obj: '(',
                around: false,
            }
        );
    }

    #[test]
    fn delete_menu_find_char_waits_for_target() {
        let mut router = router();
        let ctx = query_normal_ctx();

        router.resolve_key(&KeyChord::plain("d"), &ctx, &allow_all);
        let dispatch = router.resolve_key(&KeyChord::plain("f"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::MenuOpened("delete:char".into()));

        let dispatch = router.resolve_key(&KeyChord::plain(","), &ctx, &allow_all);
        assert_eq!(
            dispatch,
            KeyDispatch::CharCaptured {
                action: "delete_find_char".into(),
                ch: ','
            }
        );
    }

    #[test]
    fn guarded_leader_command_requires_guard() {
        let mut router = router();
        let mut ctx = query_normal_ctx();
        ctx.has_connection = false;

        router.resolve_key(&KeyChord::plain("space"), &ctx, &allow_all);
        let dispatch = router.resolve_key(&KeyChord::plain("x"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::Cancelled);

        ctx.has_connection = true;
        router.resolve_key(&KeyChord::plain("space"), &ctx, &allow_all);
        let dispatch = router.resolve_key(&KeyChord::plain("x"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::Action("disconnect".into()));
    }

    #[test]
    fn disallowed_action_falls_through_to_next_binding() {
        let mut keymap = Keymap::new();
        keymap.bind(KeyChord::plain("y"), "first_choice", &[], None);
        keymap.bind(KeyChord::plain("y"), "second_choice", &[], None);
        let mut router = KeyRouter::new(keymap);

        let ctx = InputContext::default();
        let deny_first = |action: &str| action != "first_choice";
        let dispatch = router.resolve_key(&KeyChord::plain("y"), &ctx, &deny_first);
        assert_eq!(dispatch, KeyDispatch::Action("second_choice".into()));
    }

    #[test]
    fn pending_times_out() {
        let mut router = KeyRouter::new(default_keymap()).with_timeout(Duration::from_millis(0));
        let ctx = query_normal_ctx();

        router.resolve_key(&KeyChord::plain("space"), &ctx, &allow_all);
        assert!(router.expire_pending(Instant::now()));
        assert!(!router.has_pending());
    }

    #[test]
    fn context_scoping_prefers_specific_binding() {
        let ctx = InputContext {
            focus: crate::context::FocusPane::Results,
            results_filter_active: true,
            ..Default::default()
        };
        let mut router = router();

        // In the results filter overlay, `n` means next match, not new
        // connection.
        let dispatch = router.resolve_key(&KeyChord::plain("n"), &ctx, &allow_all);
        assert_eq!(dispatch, KeyDispatch::Action("results_filter_next".into()));
    }
}
