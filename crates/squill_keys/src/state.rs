//! The key-state machine: a set of state nodes, several of which are active
//! at once (root, screen, focus, overlay). Each node allows or forbids
//! named actions, optionally behind a guard, and may carry display metadata
//! for the footer.
//!
//! States form a tree through parent links used to merge display bindings;
//! nodes live in an arena and refer to parents by index, so there are no
//! ownership cycles.

use crate::context::{Guard, InputContext};

/// Verdict of one state for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Forbidden,
    /// The state has no opinion; resolution continues to the next active
    /// state.
    Pass,
}

/// Footer placement for a displayed binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterSide {
    Left,
    Right,
}

/// Display metadata for an allowed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBinding {
    pub action: String,
    pub key_label: String,
    pub help: String,
    pub placement: FooterSide,
}

#[derive(Debug, Clone)]
struct ActionRule {
    action: String,
    verdict: Verdict,
    guard: Option<Guard>,
    display: Option<DisplayBinding>,
}

pub type StateId = usize;

/// One node of the machine.
pub struct KeyState {
    name: String,
    parent: Option<StateId>,
    activation: fn(&InputContext) -> bool,
    rules: Vec<ActionRule>,
}

/// Builder-style handle returned by `StateMachine::add_state`.
pub struct StateBuilder<'a> {
    machine: &'a mut StateMachine,
    id: StateId,
}

impl StateBuilder<'_> {
    pub fn allow(self, action: &str) -> Self {
        self.rule(action, Verdict::Allowed, None, None)
    }

    pub fn allow_if(self, action: &str, guard: Guard) -> Self {
        self.rule(action, Verdict::Allowed, Some(guard), None)
    }

    pub fn allow_shown(self, action: &str, key_label: &str, help: &str, side: FooterSide) -> Self {
        let display = DisplayBinding {
            action: action.to_string(),
            key_label: key_label.to_string(),
            help: help.to_string(),
            placement: side,
        };
        self.rule(action, Verdict::Allowed, None, Some(display))
    }

    pub fn forbid(self, action: &str) -> Self {
        self.rule(action, Verdict::Forbidden, None, None)
    }

    pub fn forbid_if(self, action: &str, guard: Guard) -> Self {
        self.rule(action, Verdict::Forbidden, Some(guard), None)
    }

    fn rule(
        self,
        action: &str,
        verdict: Verdict,
        guard: Option<Guard>,
        display: Option<DisplayBinding>,
    ) -> Self {
        self.machine.states[self.id].rules.push(ActionRule {
            action: action.to_string(),
            verdict,
            guard,
            display,
        });
        self
    }

    pub fn id(&self) -> StateId {
        self.id
    }
}

/// The machine: an arena of states plus resolution over the active set.
#[derive(Default)]
pub struct StateMachine {
    states: Vec<KeyState>,
}

fn always_active(_: &InputContext) -> bool {
    true
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a state. Later registrations are more specific: they are
    /// consulted before earlier ones during resolution.
    pub fn add_state(
        &mut self,
        name: &str,
        parent: Option<StateId>,
        activation: fn(&InputContext) -> bool,
    ) -> StateBuilder<'_> {
        let id = self.states.len();
        self.states.push(KeyState {
            name: name.to_string(),
            parent,
            activation,
            rules: Vec::new(),
        });
        StateBuilder { machine: self, id }
    }

    /// Register a state active in every context.
    pub fn add_root(&mut self, name: &str) -> StateBuilder<'_> {
        self.add_state(name, None, always_active)
    }

    pub fn state_name(&self, id: StateId) -> &str {
        &self.states[id].name
    }

    fn active_ids(&self, ctx: &InputContext) -> impl Iterator<Item = StateId> + '_ {
        // Most specific first: reverse registration order.
        let ctx = ctx.clone();
        (0..self.states.len())
            .rev()
            .filter(move |id| (self.states[*id].activation)(&ctx))
    }

    /// Resolve an action against the active states. The first non-`Pass`
    /// verdict wins. A rule for `"*"` matches any action, which is how
    /// capture-all states (modals, text inputs) fence everything off.
    pub fn check_action(&self, ctx: &InputContext, action: &str) -> Verdict {
        for id in self.active_ids(ctx) {
            for rule in &self.states[id].rules {
                if rule.action != action && rule.action != "*" {
                    continue;
                }
                if let Some(guard) = &rule.guard
                    && !guard.check(ctx)
                {
                    continue;
                }
                if rule.verdict != Verdict::Pass {
                    return rule.verdict;
                }
            }
        }
        Verdict::Pass
    }

    pub fn is_allowed(&self, ctx: &InputContext, action: &str) -> bool {
        self.check_action(ctx, action) == Verdict::Allowed
    }

    /// Display bindings of the active states, child entries first, merged
    /// up the parent chain without duplicating actions.
    pub fn display_bindings(&self, ctx: &InputContext) -> Vec<&DisplayBinding> {
        let mut seen = std::collections::HashSet::new();
        let mut bindings = Vec::new();

        for id in self.active_ids(ctx) {
            let mut current = Some(id);
            while let Some(state_id) = current {
                for rule in &self.states[state_id].rules {
                    if let Some(display) = &rule.display
                        && rule.verdict == Verdict::Allowed
                        && rule.guard.map(|g| g.check(ctx)).unwrap_or(true)
                        && seen.insert(display.action.clone())
                    {
                        bindings.push(display);
                    }
                }
                current = self.states[state_id].parent;
            }
        }

        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FocusPane, InputContext};

    fn query_focused(ctx: &InputContext) -> bool {
        ctx.focus == FocusPane::Query
    }

    fn executing(ctx: &InputContext) -> bool {
        ctx.query_executing
    }

    fn machine() -> StateMachine {
        let mut machine = StateMachine::new();
        machine
            .add_root("root")
            .allow("quit")
            .allow("show_help")
            .allow("leader_key");
        machine
            .add_state("query", None, query_focused)
            .allow("execute_query")
            .allow_if("cancel_operation", Guard::QueryExecuting);
        machine
            .add_state("executing", None, executing)
            .forbid("execute_query");
        machine
    }

    #[test]
    fn root_allows_core_actions_everywhere() {
        let machine = machine();
        let ctx = InputContext::default();
        assert_eq!(machine.check_action(&ctx, "quit"), Verdict::Allowed);
        assert_eq!(machine.check_action(&ctx, "leader_key"), Verdict::Allowed);
    }

    #[test]
    fn first_non_pass_verdict_wins() {
        let machine = machine();
        let mut ctx = InputContext {
            focus: FocusPane::Query,
            ..Default::default()
        };
        assert_eq!(machine.check_action(&ctx, "execute_query"), Verdict::Allowed);

        // The more specific "executing" state forbids it.
        ctx.query_executing = true;
        assert_eq!(
            machine.check_action(&ctx, "execute_query"),
            Verdict::Forbidden
        );
    }

    #[test]
    fn guarded_allow_passes_when_guard_fails() {
        let machine = machine();
        let mut ctx = InputContext {
            focus: FocusPane::Query,
            ..Default::default()
        };
        assert_eq!(machine.check_action(&ctx, "cancel_operation"), Verdict::Pass);

        ctx.query_executing = true;
        assert_eq!(
            machine.check_action(&ctx, "cancel_operation"),
            Verdict::Allowed
        );
    }

    #[test]
    fn unknown_action_is_pass() {
        let machine = machine();
        let ctx = InputContext::default();
        assert_eq!(machine.check_action(&ctx, "mystery"), Verdict::Pass);
    }

    #[test]
    fn display_bindings_merge_parent_chain() {
        let mut machine = StateMachine::new();
        let root = machine
            .add_root("root")
            .allow_shown("quit", "q", "Quit", FooterSide::Right)
            .id();
        machine
            .add_state("query", Some(root), query_focused)
            .allow_shown("execute_query", "enter", "Run", FooterSide::Left);

        let ctx = InputContext {
            focus: FocusPane::Query,
            ..Default::default()
        };
        let bindings = machine.display_bindings(&ctx);
        let actions: Vec<&str> = bindings.iter().map(|b| b.action.as_str()).collect();
        assert_eq!(actions, vec!["execute_query", "quit"]);
    }
}
