//! Operators: delete, yank, change. Pure functions from `(text, range)` to
//! new text, cursor, and the yanked string.

use crate::motions::{self, Motion};
use crate::types::{Position, Range, RangeKind, normalize_position, split_lines};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorResult {
    pub text: String,
    pub cursor: Position,
    pub yanked: String,
    pub enter_insert: bool,
}

/// Build the range an operator covers when composed with a motion from the
/// cursor, e.g. `dw`, `d$`, `dG`, `df,`, `d%`.
pub fn motion_range(
    text: &str,
    row: usize,
    col: usize,
    motion: Motion,
    arg: Option<char>,
) -> Range {
    let cursor = normalize_position(text, row, col);
    let result = motions::apply(motion, text, row, col, arg);

    // Motions with an inherent span (%) hand it to the operator directly.
    if let Some(range) = result.range {
        return range;
    }

    if motion.linewise() {
        Range::linewise(cursor, result.position)
    } else {
        Range::charwise(cursor, result.position, motion.inclusive())
    }
}

pub fn delete(text: &str, range: Range) -> OperatorResult {
    match range.kind {
        RangeKind::Linewise => delete_linewise(text, range),
        // Blockwise is not bound in the editor; treat it charwise.
        RangeKind::Charwise | RangeKind::Blockwise => delete_charwise(text, range),
    }
}

pub fn yank(text: &str, range: Range) -> OperatorResult {
    let deleted = delete(text, range);
    OperatorResult {
        text: text.to_string(),
        cursor: range.normalized().start,
        yanked: deleted.yanked,
        enter_insert: false,
    }
}

pub fn change(text: &str, range: Range) -> OperatorResult {
    match range.kind {
        RangeKind::Linewise => change_linewise(text, range),
        RangeKind::Charwise | RangeKind::Blockwise => {
            let mut result = delete_charwise(text, range);
            result.enter_insert = true;
            result
        }
    }
}

fn delete_charwise(text: &str, range: Range) -> OperatorResult {
    let range = range.normalized();
    let chars: Vec<char> = text.chars().collect();
    let starts = line_starts(text);

    let start_idx = to_index(&starts, text, range.start);
    let mut end_idx = to_index(&starts, text, range.end);
    if range.inclusive {
        end_idx += 1;
    }
    let end_idx = end_idx.min(chars.len());

    if start_idx >= end_idx {
        return OperatorResult {
            text: text.to_string(),
            cursor: range.start,
            yanked: String::new(),
            enter_insert: false,
        };
    }

    let yanked: String = chars[start_idx..end_idx].iter().collect();
    let new_text: String = chars[..start_idx]
        .iter()
        .chain(chars[end_idx..].iter())
        .collect();
    let cursor = index_to_position(&new_text, start_idx);

    OperatorResult {
        text: new_text,
        cursor,
        yanked,
        enter_insert: false,
    }
}

fn delete_linewise(text: &str, range: Range) -> OperatorResult {
    let range = range.normalized();
    let chars: Vec<char> = text.chars().collect();
    let starts = line_starts(text);
    let line_count = starts.len();

    let last = range.end.row.min(line_count - 1);
    let first = range.start.row.min(last);

    // Whole lines plus the trailing newline of the last one; deleting the
    // final line takes the preceding newline instead so no dangling empty
    // line is left behind.
    let (start_idx, end_idx) = if last + 1 < line_count {
        (starts[first], starts[last + 1])
    } else {
        let start = starts[first].saturating_sub(if first > 0 { 1 } else { 0 });
        (start, chars.len())
    };

    let yanked: String = chars[start_idx..end_idx].iter().collect();
    let new_text: String = chars[..start_idx]
        .iter()
        .chain(chars[end_idx..].iter())
        .collect();

    let new_lines = split_lines(&new_text);
    let row = first.min(new_lines.len() - 1);

    OperatorResult {
        text: new_text,
        cursor: Position::new(row, 0),
        yanked,
        enter_insert: false,
    }
}

fn change_linewise(text: &str, range: Range) -> OperatorResult {
    let range = range.normalized();
    let lines = split_lines(text);

    let last = range.end.row.min(lines.len() - 1);
    let first = range.start.row.min(last);

    // `cc` keeps the line itself: contents go, an empty line stays open for
    // insert mode.
    let yanked = lines[first..=last].join("\n");

    let mut new_lines: Vec<&str> = Vec::with_capacity(lines.len());
    new_lines.extend(&lines[..first]);
    new_lines.push("");
    new_lines.extend(&lines[last + 1..]);

    OperatorResult {
        text: new_lines.join("\n"),
        cursor: Position::new(first, 0),
        yanked,
        enter_insert: true,
    }
}

/// Char offset of each line start within the flat character stream.
fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, ch) in text.chars().enumerate() {
        if ch == '\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn to_index(starts: &[usize], text: &str, pos: Position) -> usize {
    let pos = normalize_position(text, pos.row, pos.col);
    starts[pos.row] + pos.col
}

fn index_to_position(text: &str, index: usize) -> Position {
    let mut row = 0;
    let mut col = 0;
    for (i, ch) in text.chars().enumerate() {
        if i == index {
            break;
        }
        if ch == '\n' {
            row += 1;
            col = 0;
        } else {
            col += 1;
        }
    }
    normalize_position(text, row, col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_objects::text_object;

    #[test]
    fn delete_inner_parens_scenario() {
        // delete, inner, '(' on `foo (bar baz) qux` with the cursor on the
        // `a` of `bar`.
        let text = "foo (bar baz) qux";
        let range = text_object('(', text, 0, 6, false).unwrap();
        let result = delete(text, range);

        assert_eq!(result.text, "foo () qux");
        assert_eq!(result.yanked, "bar baz");
        assert_eq!(result.cursor, Position::new(0, 5));
        assert!(!result.enter_insert);
    }

    #[test]
    fn delete_word_with_motion_range() {
        let text = "alpha beta gamma";
        let range = motion_range(text, 0, 0, Motion::WordForward, None);
        let result = delete(text, range);

        assert_eq!(result.text, "beta gamma");
        assert_eq!(result.yanked, "alpha ");
        assert_eq!(result.cursor, Position::new(0, 0));
    }

    #[test]
    fn delete_to_line_end_is_exclusive_of_newline() {
        let text = "alpha beta\nnext";
        let range = motion_range(text, 0, 6, Motion::LineEnd, None);
        let result = delete(text, range);

        assert_eq!(result.text, "alpha \nnext");
        assert_eq!(result.yanked, "beta");
    }

    #[test]
    fn delete_find_char_is_inclusive() {
        let text = "one, two";
        let range = motion_range(text, 0, 0, Motion::FindForward, Some(','));
        let result = delete(text, range);

        assert_eq!(result.text, " two");
        assert_eq!(result.yanked, "one,");
    }

    #[test]
    fn delete_preserves_length_invariant() {
        let cases = [
            ("alpha beta gamma", motion_range("alpha beta gamma", 0, 3, Motion::WordForward, None)),
            ("a (b) c", text_object('(', "a (b) c", 0, 3, true).unwrap()),
            ("x\ny\nz", Range::linewise(Position::new(0, 0), Position::new(1, 0))),
        ];

        for (text, range) in cases {
            let result = delete(text, range);
            assert_eq!(
                result.text.chars().count(),
                text.chars().count() - result.yanked.chars().count(),
                "length invariant failed for {:?}",
                text
            );
        }
    }

    #[test]
    fn linewise_delete_takes_trailing_newline() {
        let text = "one\ntwo\nthree";
        let range = Range::linewise(Position::new(1, 2), Position::new(1, 0));
        let result = delete(text, range);

        assert_eq!(result.text, "one\nthree");
        assert_eq!(result.yanked, "two\n");
        assert_eq!(result.cursor, Position::new(1, 0));
    }

    #[test]
    fn linewise_delete_of_last_line_takes_preceding_newline() {
        let text = "one\ntwo";
        let range = Range::linewise(Position::new(1, 0), Position::new(1, 0));
        let result = delete(text, range);

        assert_eq!(result.text, "one");
        assert_eq!(result.yanked, "\ntwo");
        assert_eq!(result.cursor, Position::new(0, 0));
    }

    #[test]
    fn delete_whole_buffer_linewise() {
        let text = "only";
        let range = Range::linewise(Position::new(0, 0), Position::new(0, 0));
        let result = delete(text, range);

        assert_eq!(result.text, "");
        assert_eq!(result.yanked, "only");
    }

    #[test]
    fn yank_leaves_text_untouched() {
        let text = "alpha beta";
        let range = motion_range(text, 0, 0, Motion::WordForward, None);
        let result = yank(text, range);

        assert_eq!(result.text, text);
        assert_eq!(result.yanked, "alpha ");
        assert_eq!(result.cursor, Position::new(0, 0));
    }

    #[test]
    fn change_enters_insert_mode() {
        let text = "foo (bar baz) qux";
        let range = text_object('(', text, 0, 6, false).unwrap();
        let result = change(text, range);

        assert_eq!(result.text, "foo () qux");
        assert_eq!(result.yanked, "bar baz");
        assert!(result.enter_insert);
    }

    #[test]
    fn change_linewise_keeps_an_empty_line() {
        let text = "one\ntwo\nthree";
        let range = Range::linewise(Position::new(1, 1), Position::new(1, 1));
        let result = change(text, range);

        assert_eq!(result.text, "one\n\nthree");
        assert_eq!(result.yanked, "two");
        assert_eq!(result.cursor, Position::new(1, 0));
        assert!(result.enter_insert);
        assert!(result.text.chars().count() <= text.chars().count());
    }

    #[test]
    fn empty_range_is_a_noop() {
        let text = "f()";
        let range = text_object('(', text, 0, 1, false).unwrap();
        let result = delete(text, range);

        assert_eq!(result.text, text);
        assert_eq!(result.yanked, "");
    }

    #[test]
    fn delete_to_file_end_is_linewise() {
        let text = "one\ntwo\nthree";
        let range = motion_range(text, 1, 1, Motion::FileEnd, None);
        let result = delete(text, range);

        assert_eq!(result.text, "one");
        assert_eq!(result.yanked, "\ntwo\nthree");
    }
}
