/// Which pane owns the keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusPane {
    #[default]
    Tree,
    Query,
    Results,
}

/// Editor mode as the key layer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VimMode {
    #[default]
    Normal,
    Insert,
}

/// Kind of the currently selected tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Connection,
    Database,
    Folder,
    Table,
    View,
    Object,
}

/// Keymap scopes. `Global` is always active; the rest activate with focus
/// and overlay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyContext {
    Global,
    Tree,
    TreeFilter,
    Query,
    QueryNormal,
    QueryInsert,
    Autocomplete,
    Results,
    ResultsFilter,
}

/// Value snapshot of everything key resolution depends on.
///
/// The shell rebuilds this on each keypress; the router and the state
/// machine only ever read it.
#[derive(Debug, Clone, Default)]
pub struct InputContext {
    pub focus: FocusPane,
    pub vim_mode: VimMode,
    /// Menu id of a pending leader sequence, when one is open.
    pub leader_menu: Option<String>,
    pub tree_filter_active: bool,
    pub results_filter_active: bool,
    pub autocomplete_open: bool,
    pub modal_open: bool,
    pub query_executing: bool,
    pub has_connection: bool,
    pub selected_node: Option<NodeKind>,
    pub last_result_error: bool,
}

impl InputContext {
    /// The key contexts active for this snapshot, most specific first.
    pub fn active_contexts(&self) -> Vec<KeyContext> {
        let mut contexts = Vec::with_capacity(4);

        match self.focus {
            FocusPane::Tree => {
                if self.tree_filter_active {
                    contexts.push(KeyContext::TreeFilter);
                }
                contexts.push(KeyContext::Tree);
            }
            FocusPane::Query => {
                if self.autocomplete_open {
                    contexts.push(KeyContext::Autocomplete);
                }
                match self.vim_mode {
                    VimMode::Normal => contexts.push(KeyContext::QueryNormal),
                    VimMode::Insert => contexts.push(KeyContext::QueryInsert),
                }
                contexts.push(KeyContext::Query);
            }
            FocusPane::Results => {
                if self.results_filter_active {
                    contexts.push(KeyContext::ResultsFilter);
                }
                contexts.push(KeyContext::Results);
            }
        }

        contexts.push(KeyContext::Global);
        contexts
    }

    pub fn is_active(&self, context: KeyContext) -> bool {
        self.active_contexts().contains(&context)
    }
}

/// Named predicates consulted before an action fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    QueryExecuting,
    NotExecuting,
    HasConnection,
    NoModal,
    LastResultError,
    NodeSelected,
    NodeIsConnection,
    NodeIsTable,
}

impl Guard {
    pub fn check(&self, ctx: &InputContext) -> bool {
        match self {
            Guard::QueryExecuting => ctx.query_executing,
            Guard::NotExecuting => !ctx.query_executing,
            Guard::HasConnection => ctx.has_connection,
            Guard::NoModal => !ctx.modal_open,
            Guard::LastResultError => ctx.last_result_error,
            Guard::NodeSelected => ctx.selected_node.is_some(),
            Guard::NodeIsConnection => ctx.selected_node == Some(NodeKind::Connection),
            Guard::NodeIsTable => {
                matches!(ctx.selected_node, Some(NodeKind::Table) | Some(NodeKind::View))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_focus_activates_mode_context() {
        let ctx = InputContext {
            focus: FocusPane::Query,
            vim_mode: VimMode::Insert,
            ..Default::default()
        };
        let active = ctx.active_contexts();
        assert_eq!(
            active,
            vec![KeyContext::QueryInsert, KeyContext::Query, KeyContext::Global]
        );
    }

    #[test]
    fn overlays_take_precedence() {
        let ctx = InputContext {
            focus: FocusPane::Results,
            results_filter_active: true,
            ..Default::default()
        };
        assert_eq!(ctx.active_contexts()[0], KeyContext::ResultsFilter);
    }

    #[test]
    fn guards_read_the_snapshot() {
        let ctx = InputContext {
            query_executing: true,
            has_connection: false,
            ..Default::default()
        };
        assert!(Guard::QueryExecuting.check(&ctx));
        assert!(!Guard::NotExecuting.check(&ctx));
        assert!(!Guard::HasConnection.check(&ctx));
        assert!(Guard::NoModal.check(&ctx));
    }
}
