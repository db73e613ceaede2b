//! The default state set: which named actions are allowed where. Several
//! states are active at once (root, screen, focus, overlay); resolution
//! walks them most specific first.

use crate::context::{FocusPane, Guard, InputContext, VimMode};
use crate::state::{FooterSide, StateMachine};

fn main_screen(ctx: &InputContext) -> bool {
    !ctx.modal_open && !ctx.query_executing
}

fn query_executing(ctx: &InputContext) -> bool {
    !ctx.modal_open && ctx.query_executing
}

fn modal_active(ctx: &InputContext) -> bool {
    ctx.modal_open
}

fn tree_focused(ctx: &InputContext) -> bool {
    !ctx.modal_open && ctx.focus == FocusPane::Tree && !ctx.tree_filter_active
}

fn tree_filter_active(ctx: &InputContext) -> bool {
    !ctx.modal_open && ctx.focus == FocusPane::Tree && ctx.tree_filter_active
}

fn query_normal(ctx: &InputContext) -> bool {
    !ctx.modal_open && ctx.focus == FocusPane::Query && ctx.vim_mode == VimMode::Normal
}

fn query_insert(ctx: &InputContext) -> bool {
    !ctx.modal_open && ctx.focus == FocusPane::Query && ctx.vim_mode == VimMode::Insert
}

fn results_focused(ctx: &InputContext) -> bool {
    !ctx.modal_open && ctx.focus == FocusPane::Results && !ctx.results_filter_active
}

fn results_filter(ctx: &InputContext) -> bool {
    !ctx.modal_open && ctx.focus == FocusPane::Results && ctx.results_filter_active
}

/// Build the default machine. Registration order matters: later states are
/// more specific and are consulted first.
pub fn default_state_machine() -> StateMachine {
    let mut machine = StateMachine::new();

    // Root: the minimal set available everywhere.
    let root = machine
        .add_root("root")
        .allow("quit")
        .allow("show_help")
        .allow("leader_key")
        .id();

    machine
        .add_state("main_screen", Some(root), main_screen)
        .allow("focus_explorer")
        .allow("focus_query")
        .allow("focus_results")
        .allow("toggle_explorer")
        .allow("toggle_fullscreen")
        .allow("change_theme")
        .allow("show_connection_picker")
        .allow("command_mode")
        .allow_if("disconnect", Guard::HasConnection)
        .allow_shown("leader_key", "<space>", "Commands", FooterSide::Right);

    machine
        .add_state("tree_focused", Some(root), tree_focused)
        .allow_shown("new_connection", "n", "New connection", FooterSide::Left)
        .allow_if("select_table", Guard::NodeIsTable)
        .allow("refresh_tree")
        .allow_if("edit_connection", Guard::NodeIsConnection)
        .allow_if("delete_connection", Guard::NodeIsConnection)
        .allow_if("duplicate_connection", Guard::NodeIsConnection)
        .allow("collapse_tree")
        .allow("tree_cursor_down")
        .allow("tree_cursor_up")
        .allow("tree_filter");

    // Filter overlays capture typing; the leader key must not fire.
    machine
        .add_state("tree_filter_active", Some(root), tree_filter_active)
        .allow("tree_filter_close")
        .allow("tree_filter_accept")
        .allow("tree_filter_next")
        .allow("tree_filter_prev")
        .forbid("leader_key");

    machine
        .add_state("query_normal", Some(root), query_normal)
        .allow_shown("enter_insert_mode", "i", "Insert mode", FooterSide::Left)
        .allow_shown("execute_query", "enter", "Execute", FooterSide::Left)
        .allow("open_menu:delete")
        .allow("open_menu:change")
        .allow("open_menu:g")
        .allow("open_menu:yank")
        .allow_shown("new_query", "n", "New query", FooterSide::Left)
        .allow_shown("show_history", "h", "History", FooterSide::Left)
        .allow("copy_context")
        .allow("select_all")
        .allow("copy_selection")
        .allow("paste")
        .allow("undo")
        .allow("redo");

    machine
        .add_state("query_insert", Some(root), query_insert)
        .allow_shown("exit_insert_mode", "esc", "Normal mode", FooterSide::Left)
        .allow("execute_query_insert")
        .allow("autocomplete_next")
        .allow("autocomplete_prev")
        .allow("select_all")
        .allow("copy_selection")
        .allow("paste")
        .allow("undo")
        .allow("redo")
        // Space must insert a space, never open the leader menu.
        .forbid("leader_key");

    machine
        .add_state("results_focused", Some(root), results_focused)
        .allow("view_cell")
        .allow("view_cell_full")
        .allow_shown("copy_context", "y", "Copy cell", FooterSide::Left)
        .allow("copy_row")
        .allow("copy_results")
        .allow("edit_cell")
        .allow("results_cursor_left")
        .allow("results_cursor_down")
        .allow("results_cursor_up")
        .allow("results_cursor_right")
        .allow("clear_results")
        .allow("results_filter");

    machine
        .add_state("results_filter_active", Some(root), results_filter)
        .allow("results_filter_close")
        .allow("results_filter_accept")
        .allow("results_filter_next")
        .allow("results_filter_prev")
        .forbid("leader_key");

    // While a query runs, execution is fenced off and cancel appears.
    machine
        .add_state("query_executing", Some(root), query_executing)
        .allow_shown("cancel_operation", "^z", "Cancel", FooterSide::Left)
        .allow("quit")
        .forbid("execute_query")
        .forbid("execute_query_insert");

    // Modals capture everything but quit. Registered last: most specific.
    machine
        .add_state("modal_active", Some(root), modal_active)
        .allow("quit")
        .forbid("*");

    machine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeKind;
    use crate::state::Verdict;

    #[test]
    fn root_actions_available_everywhere() {
        let machine = default_state_machine();
        let ctx = InputContext::default();
        assert_eq!(machine.check_action(&ctx, "quit"), Verdict::Allowed);
        assert_eq!(machine.check_action(&ctx, "show_help"), Verdict::Allowed);
        assert_eq!(machine.check_action(&ctx, "leader_key"), Verdict::Allowed);
    }

    #[test]
    fn modal_fences_everything_but_quit() {
        let machine = default_state_machine();
        let ctx = InputContext {
            modal_open: true,
            ..Default::default()
        };
        assert_eq!(machine.check_action(&ctx, "quit"), Verdict::Allowed);
        assert_eq!(machine.check_action(&ctx, "execute_query"), Verdict::Forbidden);
        assert_eq!(machine.check_action(&ctx, "leader_key"), Verdict::Forbidden);
    }

    #[test]
    fn executing_fences_execution_and_offers_cancel() {
        let machine = default_state_machine();
        let ctx = InputContext {
            focus: FocusPane::Query,
            query_executing: true,
            ..Default::default()
        };
        assert_eq!(
            machine.check_action(&ctx, "execute_query"),
            Verdict::Forbidden
        );
        assert_eq!(
            machine.check_action(&ctx, "cancel_operation"),
            Verdict::Allowed
        );
    }

    #[test]
    fn insert_mode_forbids_leader() {
        let machine = default_state_machine();
        let ctx = InputContext {
            focus: FocusPane::Query,
            vim_mode: VimMode::Insert,
            ..Default::default()
        };
        assert_eq!(machine.check_action(&ctx, "leader_key"), Verdict::Forbidden);
        assert_eq!(
            machine.check_action(&ctx, "exit_insert_mode"),
            Verdict::Allowed
        );
    }

    #[test]
    fn tree_actions_respect_node_kind_guards() {
        let machine = default_state_machine();
        let mut ctx = InputContext::default();

        assert_eq!(machine.check_action(&ctx, "select_table"), Verdict::Pass);
        assert_eq!(machine.check_action(&ctx, "edit_connection"), Verdict::Pass);

        ctx.selected_node = Some(NodeKind::Table);
        assert_eq!(machine.check_action(&ctx, "select_table"), Verdict::Allowed);

        ctx.selected_node = Some(NodeKind::Connection);
        assert_eq!(
            machine.check_action(&ctx, "edit_connection"),
            Verdict::Allowed
        );
    }

    #[test]
    fn disconnect_needs_a_connection() {
        let machine = default_state_machine();
        let mut ctx = InputContext::default();
        assert_eq!(machine.check_action(&ctx, "disconnect"), Verdict::Pass);

        ctx.has_connection = true;
        assert_eq!(machine.check_action(&ctx, "disconnect"), Verdict::Allowed);
    }

    #[test]
    fn footer_bindings_merge_without_duplicates() {
        let machine = default_state_machine();
        let ctx = InputContext {
            focus: FocusPane::Query,
            ..Default::default()
        };

        let bindings = machine.display_bindings(&ctx);
        let actions: Vec<&str> = bindings.iter().map(|b| b.action.as_str()).collect();
        assert!(actions.contains(&"enter_insert_mode"));
        assert!(actions.contains(&"leader_key"));

        let unique: std::collections::HashSet<&&str> = actions.iter().collect();
        assert_eq!(unique.len(), actions.len());
    }
}
