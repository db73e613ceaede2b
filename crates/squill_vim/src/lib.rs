mod editor;
mod motions;
mod operators;
mod text_objects;
mod types;
mod undo;

pub use editor::{EditorState, Mode, Operator};
pub use motions::{Motion, apply as apply_motion};
pub use operators::{OperatorResult, change, delete, motion_range, yank};
pub use text_objects::text_object;
pub use types::{MotionResult, Position, Range, RangeKind, normalize_position};
pub use undo::{Snapshot, UndoHistory};
