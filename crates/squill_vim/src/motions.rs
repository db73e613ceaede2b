//! Pure motion functions. Nothing here mutates text: a motion maps a cursor
//! position (after normalization) to a target position, and sometimes to an
//! inherent range (`%`).

use crate::types::{MotionResult, Position, Range, normalize_position, split_lines};

/// The motion set bound in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Left,
    Down,
    Up,
    Right,
    /// `w`
    WordForward,
    /// `W`
    BigWordForward,
    /// `b`
    WordBack,
    /// `B`
    BigWordBack,
    /// `e`
    WordEnd,
    /// `E`
    BigWordEnd,
    /// `ge`
    WordEndBack,
    /// `gE`
    BigWordEndBack,
    /// `0`
    LineStart,
    /// `$`
    LineEnd,
    /// `gg`
    FileStart,
    /// `G`
    FileEnd,
    /// `f<char>`
    FindForward,
    /// `F<char>`
    FindBack,
    /// `t<char>`
    TillForward,
    /// `T<char>`
    TillBack,
    /// `%`
    MatchingBracket,
}

impl Motion {
    /// Whether the motion needs a pending target character (`f`/`F`/`t`/`T`).
    pub fn wants_char(&self) -> bool {
        matches!(
            self,
            Motion::FindForward | Motion::FindBack | Motion::TillForward | Motion::TillBack
        )
    }

    /// Whether an operator over this motion covers the target character.
    pub fn inclusive(&self) -> bool {
        matches!(
            self,
            Motion::WordEnd
                | Motion::BigWordEnd
                | Motion::WordEndBack
                | Motion::BigWordEndBack
                | Motion::FindForward
                | Motion::FindBack
                | Motion::TillForward
                | Motion::TillBack
                | Motion::MatchingBracket
        )
    }

    /// Whether an operator over this motion works on whole lines.
    pub fn linewise(&self) -> bool {
        matches!(
            self,
            Motion::Down | Motion::Up | Motion::FileStart | Motion::FileEnd
        )
    }
}

/// Apply a motion. The cursor is normalized into the buffer first; motions
/// that would leave the buffer stop at its edge.
pub fn apply(motion: Motion, text: &str, row: usize, col: usize, arg: Option<char>) -> MotionResult {
    let pos = normalize_position(text, row, col);
    let lines = split_lines(text);

    match motion {
        Motion::Left => MotionResult::to(Position::new(pos.row, pos.col.saturating_sub(1))),
        Motion::Right => {
            let max = line_len(&lines, pos.row);
            MotionResult::to(Position::new(pos.row, (pos.col + 1).min(max)))
        }
        Motion::Down => {
            let row = (pos.row + 1).min(lines.len() - 1);
            MotionResult::to(Position::new(row, pos.col.min(line_len(&lines, row))))
        }
        Motion::Up => {
            let row = pos.row.saturating_sub(1);
            MotionResult::to(Position::new(row, pos.col.min(line_len(&lines, row))))
        }
        Motion::LineStart => MotionResult::to(Position::new(pos.row, 0)),
        Motion::LineEnd => MotionResult::to(Position::new(pos.row, line_len(&lines, pos.row))),
        Motion::FileStart => MotionResult::to(Position::new(0, 0)),
        Motion::FileEnd => MotionResult::to(Position::new(lines.len() - 1, 0)),
        Motion::WordForward => MotionResult::to(word_forward(&lines, pos, false)),
        Motion::BigWordForward => MotionResult::to(word_forward(&lines, pos, true)),
        Motion::WordBack => MotionResult::to(word_back(&lines, pos, false)),
        Motion::BigWordBack => MotionResult::to(word_back(&lines, pos, true)),
        Motion::WordEnd => MotionResult::to(word_end(&lines, pos, false)),
        Motion::BigWordEnd => MotionResult::to(word_end(&lines, pos, true)),
        Motion::WordEndBack => MotionResult::to(word_end_back(&lines, pos, false)),
        Motion::BigWordEndBack => MotionResult::to(word_end_back(&lines, pos, true)),
        Motion::FindForward => char_search(&lines, pos, arg, true, false),
        Motion::FindBack => char_search(&lines, pos, arg, false, false),
        Motion::TillForward => char_search(&lines, pos, arg, true, true),
        Motion::TillBack => char_search(&lines, pos, arg, false, true),
        Motion::MatchingBracket => matching_bracket(&lines, pos),
    }
}

fn line_len(lines: &[&str], row: usize) -> usize {
    lines[row].chars().count()
}

fn char_at(lines: &[&str], pos: Position) -> Option<char> {
    lines[pos.row].chars().nth(pos.col)
}

/// Vim's two token notions: a word is `[A-Za-z0-9_]`, a WORD is any run of
/// non-whitespace. Punctuation forms its own small-word runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Whitespace,
    Word,
    Punct,
}

fn classify(ch: char, big: bool) -> CharClass {
    if ch.is_whitespace() {
        CharClass::Whitespace
    } else if big || ch.is_alphanumeric() || ch == '_' {
        CharClass::Word
    } else {
        CharClass::Punct
    }
}

fn class_at(lines: &[&str], pos: Position, big: bool) -> CharClass {
    char_at(lines, pos)
        .map(|c| classify(c, big))
        .unwrap_or(CharClass::Whitespace)
}

/// Step one position forward, wrapping across line ends. Returns `None` at
/// the end of the buffer.
fn step_forward(lines: &[&str], pos: Position) -> Option<Position> {
    if pos.col < line_len(lines, pos.row) {
        return Some(Position::new(pos.row, pos.col + 1));
    }
    if pos.row + 1 < lines.len() {
        return Some(Position::new(pos.row + 1, 0));
    }
    None
}

/// Step one position backward, wrapping across line starts. Returns `None`
/// at the start of the buffer.
fn step_back(lines: &[&str], pos: Position) -> Option<Position> {
    if pos.col > 0 {
        return Some(Position::new(pos.row, pos.col - 1));
    }
    if pos.row > 0 {
        let row = pos.row - 1;
        return Some(Position::new(row, line_len(lines, row)));
    }
    None
}

fn buffer_end(lines: &[&str]) -> Position {
    let row = lines.len() - 1;
    Position::new(row, line_len(lines, row))
}

fn word_forward(lines: &[&str], pos: Position, big: bool) -> Position {
    let mut cur = pos;
    let start_class = class_at(lines, cur, big);

    // Leave the current run.
    if start_class != CharClass::Whitespace {
        loop {
            match step_forward(lines, cur) {
                Some(next) => {
                    cur = next;
                    if class_at(lines, cur, big) != start_class || cur.col == line_len(lines, cur.row)
                    {
                        break;
                    }
                }
                None => return buffer_end(lines),
            }
        }
    }

    // Skip whitespace to the next run.
    while class_at(lines, cur, big) == CharClass::Whitespace {
        match step_forward(lines, cur) {
            Some(next) => cur = next,
            None => return buffer_end(lines),
        }
    }

    cur
}

fn word_back(lines: &[&str], pos: Position, big: bool) -> Position {
    let mut cur = match step_back(lines, pos) {
        Some(p) => p,
        None => return Position::new(0, 0),
    };

    // Skip whitespace (and virtual line-end columns).
    while class_at(lines, cur, big) == CharClass::Whitespace {
        match step_back(lines, cur) {
            Some(p) => cur = p,
            None => return Position::new(0, 0),
        }
    }

    // Walk to the start of this run.
    let class = class_at(lines, cur, big);
    loop {
        match step_back(lines, cur) {
            Some(prev) => {
                if prev.col == line_len(lines, prev.row) || class_at(lines, prev, big) != class {
                    break;
                }
                cur = prev;
            }
            None => break,
        }
    }

    cur
}

fn word_end(lines: &[&str], pos: Position, big: bool) -> Position {
    let mut cur = match step_forward(lines, pos) {
        Some(p) => p,
        None => return pos,
    };

    while class_at(lines, cur, big) == CharClass::Whitespace {
        match step_forward(lines, cur) {
            Some(p) => cur = p,
            None => return cur,
        }
    }

    let class = class_at(lines, cur, big);
    loop {
        match step_forward(lines, cur) {
            Some(next) => {
                if class_at(lines, next, big) != class || next.col == line_len(lines, next.row) {
                    break;
                }
                cur = next;
            }
            None => break,
        }
    }

    cur
}

fn word_end_back(lines: &[&str], pos: Position, big: bool) -> Position {
    let mut cur = match step_back(lines, pos) {
        Some(p) => p,
        None => return pos,
    };

    // A run end is the first non-whitespace character looking backwards that
    // is followed by whitespace or a class change.
    loop {
        let here = class_at(lines, cur, big);
        if here != CharClass::Whitespace {
            let next_class = step_forward(lines, cur)
                .map(|n| class_at(lines, n, big))
                .unwrap_or(CharClass::Whitespace);
            if next_class != here {
                return cur;
            }
        }
        match step_back(lines, cur) {
            Some(p) => cur = p,
            None => return Position::new(0, 0),
        }
    }
}

fn char_search(
    lines: &[&str],
    pos: Position,
    arg: Option<char>,
    forward: bool,
    till: bool,
) -> MotionResult {
    let Some(target) = arg else {
        return MotionResult::to(pos);
    };

    let chars: Vec<char> = lines[pos.row].chars().collect();

    let found = if forward {
        chars
            .iter()
            .enumerate()
            .skip(pos.col + 1)
            .find(|(_, c)| **c == target)
            .map(|(i, _)| i)
    } else {
        chars[..pos.col.min(chars.len())]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, c)| **c == target)
            .map(|(i, _)| i)
    };

    match found {
        Some(idx) => {
            let col = match (forward, till) {
                (true, true) => idx.saturating_sub(1),
                (false, true) => idx + 1,
                (_, false) => idx,
            };
            MotionResult::to(Position::new(pos.row, col))
        }
        // Target not on the line: the motion fails in place.
        None => MotionResult::to(pos),
    }
}

const OPENERS: [char; 3] = ['(', '[', '{'];
const CLOSERS: [char; 3] = [')', ']', '}'];

fn bracket_pair(ch: char) -> Option<(char, char, bool)> {
    match ch {
        '(' => Some(('(', ')', true)),
        '[' => Some(('[', ']', true)),
        '{' => Some(('{', '}', true)),
        ')' => Some(('(', ')', false)),
        ']' => Some(('[', ']', false)),
        '}' => Some(('{', '}', false)),
        _ => None,
    }
}

fn matching_bracket(lines: &[&str], pos: Position) -> MotionResult {
    // If the cursor is not on a bracket, scan forward on the current line
    // for the first one.
    let chars: Vec<char> = lines[pos.row].chars().collect();
    let start_col = (pos.col..chars.len())
        .find(|&i| OPENERS.contains(&chars[i]) || CLOSERS.contains(&chars[i]));

    let Some(start_col) = start_col else {
        return MotionResult::to(pos);
    };

    let origin = Position::new(pos.row, start_col);
    let Some((open, close, is_open)) = bracket_pair(chars[start_col]) else {
        return MotionResult::to(pos);
    };

    let target = if is_open {
        scan_for_match(lines, origin, open, close, true)
    } else {
        scan_for_match(lines, origin, open, close, false)
    };

    match target {
        Some(matched) => MotionResult {
            position: matched,
            range: Some(Range::charwise(origin, matched, true)),
        },
        None => MotionResult::to(pos),
    }
}

fn scan_for_match(
    lines: &[&str],
    origin: Position,
    open: char,
    close: char,
    forward: bool,
) -> Option<Position> {
    let mut depth = 0i32;
    let mut cur = origin;

    loop {
        if let Some(ch) = char_at(lines, cur) {
            if ch == open {
                depth += if forward { 1 } else { -1 };
            } else if ch == close {
                depth += if forward { -1 } else { 1 };
            }

            if depth == 0 && cur != origin {
                return Some(cur);
            }
        }

        cur = if forward {
            step_forward(lines, cur)?
        } else {
            step_back(lines, cur)?
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn go(motion: Motion, text: &str, row: usize, col: usize) -> Position {
        apply(motion, text, row, col, None).position
    }

    fn go_char(motion: Motion, text: &str, row: usize, col: usize, ch: char) -> Position {
        apply(motion, text, row, col, Some(ch)).position
    }

    // The composition scenario: w, w, b, e, $ over "alpha beta gamma".
    #[test]
    fn word_motion_composition() {
        let text = "alpha beta gamma";
        let p = go(Motion::WordForward, text, 0, 0);
        assert_eq!(p, Position::new(0, 6));
        let p = go(Motion::WordForward, text, p.row, p.col);
        assert_eq!(p, Position::new(0, 11));
        let p = go(Motion::WordBack, text, p.row, p.col);
        assert_eq!(p, Position::new(0, 6));
        let p = go(Motion::WordEnd, text, p.row, p.col);
        assert_eq!(p, Position::new(0, 9));
        let p = go(Motion::LineEnd, text, p.row, p.col);
        assert_eq!(p, Position::new(0, 16));
    }

    #[test]
    fn word_vs_big_word() {
        let text = "foo.bar baz";
        // w stops at the punctuation run, W skips to the next WORD.
        assert_eq!(go(Motion::WordForward, text, 0, 0), Position::new(0, 3));
        assert_eq!(go(Motion::BigWordForward, text, 0, 0), Position::new(0, 8));
    }

    #[test]
    fn word_forward_wraps_lines() {
        let text = "alpha\nbeta";
        assert_eq!(go(Motion::WordForward, text, 0, 0), Position::new(1, 0));
    }

    #[test]
    fn word_back_wraps_lines() {
        let text = "alpha\nbeta";
        assert_eq!(go(Motion::WordBack, text, 1, 0), Position::new(0, 0));
    }

    #[test]
    fn word_back_from_inside_word_goes_to_its_start() {
        let text = "alpha beta";
        assert_eq!(go(Motion::WordBack, text, 0, 8), Position::new(0, 6));
    }

    #[test]
    fn end_of_buffer_stops_word_forward() {
        let text = "alpha";
        assert_eq!(go(Motion::WordForward, text, 0, 2), Position::new(0, 5));
    }

    #[test]
    fn file_motions() {
        let text = "one\ntwo\nthree";
        assert_eq!(go(Motion::FileStart, text, 2, 2), Position::new(0, 0));
        // G targets the first column of the last line.
        assert_eq!(go(Motion::FileEnd, text, 0, 2), Position::new(2, 0));
    }

    #[test]
    fn vertical_motion_clamps_column() {
        let text = "abcdef\nab";
        assert_eq!(go(Motion::Down, text, 0, 5), Position::new(1, 2));
        assert_eq!(go(Motion::Up, text, 1, 2), Position::new(0, 2));
    }

    #[test]
    fn ge_lands_on_previous_word_end() {
        let text = "alpha beta";
        assert_eq!(go(Motion::WordEndBack, text, 0, 7), Position::new(0, 4));
    }

    #[test]
    fn find_and_till() {
        let text = "select * from t";
        assert_eq!(go_char(Motion::FindForward, text, 0, 0, 'f'), Position::new(0, 9));
        assert_eq!(go_char(Motion::TillForward, text, 0, 0, 'f'), Position::new(0, 8));
        assert_eq!(go_char(Motion::FindBack, text, 0, 9, 's'), Position::new(0, 0));
        assert_eq!(go_char(Motion::TillBack, text, 0, 9, 's'), Position::new(0, 1));
        // Missing target: stay put.
        assert_eq!(go_char(Motion::FindForward, text, 0, 0, 'z'), Position::new(0, 0));
    }

    #[test]
    fn matching_bracket_handles_nesting() {
        let text = "fn((a, (b)), c)";
        assert_eq!(go(Motion::MatchingBracket, text, 0, 2), Position::new(0, 14));
        assert_eq!(go(Motion::MatchingBracket, text, 0, 14), Position::new(0, 2));
        assert_eq!(go(Motion::MatchingBracket, text, 0, 7), Position::new(0, 9));
    }

    #[test]
    fn matching_bracket_searches_forward_on_line() {
        let text = "let x = (1 + 2)";
        // Cursor before any bracket: the first one on the line is used.
        assert_eq!(go(Motion::MatchingBracket, text, 0, 0), Position::new(0, 14));
    }

    #[test]
    fn matching_bracket_spans_lines() {
        let text = "begin (\n  nested\n)";
        assert_eq!(go(Motion::MatchingBracket, text, 0, 6), Position::new(2, 0));
    }

    #[test]
    fn motions_normalize_out_of_bounds_cursor() {
        let text = "ab\ncd";
        // Row and column beyond the buffer are clamped before moving.
        assert_eq!(go(Motion::Left, text, 7, 9), Position::new(1, 1));
    }
}
