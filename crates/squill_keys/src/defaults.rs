//! The default keymap: direct bindings per context plus the leader and
//! operator menus.

use crate::chord::{KeyChord, Modifiers};
use crate::context::{Guard, KeyContext};
use crate::router::{Keymap, LeaderCommand};

fn cmd(key: char, action: &str, label: &str, category: &str) -> LeaderCommand {
    LeaderCommand {
        key,
        action: action.to_string(),
        label: label.to_string(),
        category: category.to_string(),
        guard: None,
    }
}

fn cmd_guarded(key: char, action: &str, label: &str, category: &str, guard: Guard) -> LeaderCommand {
    LeaderCommand {
        guard: Some(guard),
        ..cmd(key, action, label, category)
    }
}

/// Entries shared by the three operator menus (delete/yank/change compose
/// with the same motion set).
fn operator_menu(keymap: &mut Keymap, menu: &str, verb: &str) {
    let entries: Vec<LeaderCommand> = vec![
        cmd('w', &format!("{verb}_word"), "word", menu),
        cmd('W', &format!("{verb}_WORD"), "WORD", menu),
        cmd('b', &format!("{verb}_word_back"), "word back", menu),
        cmd('B', &format!("{verb}_WORD_back"), "WORD back", menu),
        cmd('e', &format!("{verb}_word_end"), "to word end", menu),
        cmd('E', &format!("{verb}_WORD_end"), "to WORD end", menu),
        cmd('0', &format!("{verb}_line_start"), "to line start", menu),
        cmd('$', &format!("{verb}_line_end"), "to line end", menu),
        cmd('h', &format!("{verb}_left"), "left", menu),
        cmd('j', &format!("{verb}_down"), "line down", menu),
        cmd('k', &format!("{verb}_up"), "line up", menu),
        cmd('l', &format!("{verb}_right"), "right", menu),
        cmd('G', &format!("{verb}_to_end"), "to end", menu),
        cmd('%', &format!("{verb}_matching_bracket"), "to bracket", menu),
        // `f`/`F`/`t`/`T` wait for a target character.
        cmd('f', &format!("char:{verb}_find_char"), "to char...", menu),
        cmd('F', &format!("char:{verb}_find_char_back"), "back to char...", menu),
        cmd('t', &format!("char:{verb}_till_char"), "till char...", menu),
        cmd('T', &format!("char:{verb}_till_char_back"), "back till char...", menu),
        // `i`/`a` wait for a text object.
        cmd('i', "inner", "inside...", menu),
        cmd('a', "around", "around...", menu),
    ];

    for entry in entries {
        keymap.add_menu_command(menu, entry);
    }
}

/// Build the default keymap.
pub fn default_keymap() -> Keymap {
    use KeyContext::*;

    let mut keymap = Keymap::new();

    let plain = KeyChord::plain;
    let ctrl = |key: &str| KeyChord::new(key, Modifiers::ctrl());

    // Global.
    keymap.bind(plain("space"), "leader_key", &[], None);
    keymap.bind(ctrl("q"), "quit", &[], None);
    keymap.bind(plain("?"), "show_help", &[], None);
    keymap.bind(plain(":"), "command_mode", &[], None);
    keymap.bind(ctrl("z"), "cancel_operation", &[], Some(Guard::QueryExecuting));

    // Tree.
    keymap.bind(plain("n"), "new_connection", &[Tree], None);
    keymap.bind(plain("s"), "select_table", &[Tree], None);
    keymap.bind(plain("f"), "refresh_tree", &[Tree], None);
    keymap.bind(plain("R"), "refresh_tree", &[Tree], None);
    keymap.bind(plain("e"), "edit_connection", &[Tree], None);
    keymap.bind(plain("d"), "delete_connection", &[Tree], None);
    keymap.bind(plain("delete"), "delete_connection", &[Tree], None);
    keymap.bind(plain("D"), "duplicate_connection", &[Tree], None);
    keymap.bind(plain("x"), "disconnect", &[Tree], Some(Guard::HasConnection));
    keymap.bind(plain("z"), "collapse_tree", &[Tree], None);
    keymap.bind(plain("j"), "tree_cursor_down", &[Tree], None);
    keymap.bind(plain("k"), "tree_cursor_up", &[Tree], None);
    keymap.bind(plain("/"), "tree_filter", &[Tree], None);
    keymap.bind(plain("escape"), "tree_filter_close", &[TreeFilter], None);
    keymap.bind(plain("enter"), "tree_filter_accept", &[TreeFilter], None);
    keymap.bind(plain("n"), "tree_filter_next", &[TreeFilter], None);
    keymap.bind(plain("N"), "tree_filter_prev", &[TreeFilter], None);

    // Query, normal mode.
    keymap.bind(plain("i"), "enter_insert_mode", &[QueryNormal], None);
    keymap.bind(plain("escape"), "exit_insert_mode", &[Query], None);
    keymap.bind(plain("enter"), "execute_query", &[QueryNormal], None);
    keymap.bind(plain("f5"), "execute_query_insert", &[QueryInsert], None);
    keymap.bind(ctrl("enter"), "execute_query_insert", &[QueryInsert], None);
    keymap.bind(plain("n"), "new_query", &[QueryNormal], None);
    keymap.bind(plain("h"), "show_history", &[QueryNormal], None);
    keymap.bind(plain("y"), "copy_context", &[QueryNormal], None);

    // Operator and g-prefix menus.
    keymap.bind(plain("d"), "open_menu:delete", &[QueryNormal], None);
    keymap.bind(plain("c"), "open_menu:change", &[QueryNormal], None);
    keymap.bind(plain("g"), "open_menu:g", &[QueryNormal], None);

    // Query, both modes.
    keymap.bind(ctrl("a"), "select_all", &[Query], None);
    keymap.bind(ctrl("c"), "copy_selection", &[Query], None);
    keymap.bind(ctrl("v"), "paste", &[Query], None);
    keymap.bind(ctrl("z"), "undo", &[Query], Some(Guard::NotExecuting));
    keymap.bind(ctrl("y"), "redo", &[Query], None);

    // Vim-style undo/redo, normal mode only.
    keymap.bind(plain("u"), "undo", &[QueryNormal], None);
    keymap.bind(ctrl("r"), "redo", &[QueryNormal], None);

    // Autocomplete popup, insert mode.
    keymap.bind(ctrl("j"), "autocomplete_next", &[Autocomplete], None);
    keymap.bind(ctrl("k"), "autocomplete_prev", &[Autocomplete], None);

    // Results.
    keymap.bind(plain("v"), "view_cell", &[Results], None);
    keymap.bind(plain("V"), "view_cell_full", &[Results], None);
    keymap.bind(plain("y"), "copy_context", &[Results], None);
    keymap.bind(plain("Y"), "copy_row", &[Results], None);
    keymap.bind(plain("a"), "copy_results", &[Results], None);
    keymap.bind(plain("u"), "edit_cell", &[Results], None);
    keymap.bind(plain("h"), "results_cursor_left", &[Results], None);
    keymap.bind(plain("j"), "results_cursor_down", &[Results], None);
    keymap.bind(plain("k"), "results_cursor_up", &[Results], None);
    keymap.bind(plain("l"), "results_cursor_right", &[Results], None);
    keymap.bind(plain("x"), "clear_results", &[Results], None);
    keymap.bind(plain("/"), "results_filter", &[Results], None);
    keymap.bind(plain("escape"), "results_filter_close", &[ResultsFilter], None);
    keymap.bind(plain("enter"), "results_filter_accept", &[ResultsFilter], None);
    keymap.bind(plain("n"), "results_filter_next", &[ResultsFilter], None);
    keymap.bind(plain("N"), "results_filter_prev", &[ResultsFilter], None);

    // Leader menu.
    keymap.add_menu_command("leader", cmd('e', "toggle_explorer", "Toggle Explorer", "View"));
    keymap.add_menu_command("leader", cmd('f', "toggle_fullscreen", "Toggle Maximize", "View"));
    keymap.add_menu_command("leader", cmd('c', "show_connection_picker", "Connect", "Connection"));
    keymap.add_menu_command(
        "leader",
        cmd_guarded('x', "disconnect", "Disconnect", "Connection", Guard::HasConnection),
    );
    keymap.add_menu_command(
        "leader",
        cmd_guarded('z', "cancel_operation", "Cancel", "Actions", Guard::QueryExecuting),
    );
    keymap.add_menu_command("leader", cmd('t', "change_theme", "Change Theme", "Actions"));
    keymap.add_menu_command("leader", cmd('h', "show_help", "Help", "Actions"));
    keymap.add_menu_command("leader", cmd('q', "quit", "Quit", "Actions"));

    // Operator menus.
    operator_menu(&mut keymap, "delete", "delete");
    keymap.add_menu_command("delete", cmd('d', "delete_line", "line", "delete"));
    keymap.add_menu_command("delete", cmd('x', "delete_char", "char", "delete"));
    keymap.add_menu_command("delete", cmd('X', "delete_char_back", "char back", "delete"));
    keymap.add_menu_command("delete", cmd('D', "delete_line_end", "to line end", "delete"));

    operator_menu(&mut keymap, "yank", "yank");
    keymap.add_menu_command("yank", cmd('y', "yank_line", "line", "yank"));

    operator_menu(&mut keymap, "change", "change");
    keymap.add_menu_command("change", cmd('c', "change_line", "line", "change"));

    // g-prefix motions.
    keymap.add_menu_command("g", cmd('g', "motion_file_start", "go to top", "g"));
    keymap.add_menu_command("g", cmd('e', "motion_word_end_back", "word end back", "g"));
    keymap.add_menu_command("g", cmd('E', "motion_WORD_end_back", "WORD end back", "g"));

    keymap
}

/// The `y` key in query normal mode copies context by default, but opens
/// the yank menu when the editor has focus and no selection; the shell
/// rebinds it via this helper when vim yank is preferred.
pub fn bind_vim_yank(keymap: &mut Keymap) {
    keymap.bind(
        KeyChord::plain("y"),
        "open_menu:yank",
        &[KeyContext::QueryNormal],
        None,
    );
}
