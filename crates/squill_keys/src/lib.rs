mod chord;
mod context;
mod defaults;
mod router;
mod state;
mod states;

pub use chord::{KeyChord, Modifiers, ParseError};
pub use context::{FocusPane, Guard, InputContext, KeyContext, NodeKind, VimMode};
pub use defaults::{bind_vim_yank, default_keymap};
pub use router::{Binding, KeyDispatch, KeyRouter, Keymap, LeaderCommand};
pub use state::{DisplayBinding, FooterSide, StateBuilder, StateId, StateMachine, Verdict};
pub use states::default_state_machine;
