//! Text objects: the spans behind `i(`/`a(`, `i"`/`a"`, `iw`/`aw`.

use crate::types::{Position, Range, normalize_position, split_lines};

/// Resolve a text object at the cursor.
///
/// `around` includes the delimiters (and for words and quotes the
/// surrounding whitespace vim takes); inner covers only the contents.
/// Returns `None` when no object encloses the cursor.
pub fn text_object(obj: char, text: &str, row: usize, col: usize, around: bool) -> Option<Range> {
    let pos = normalize_position(text, row, col);
    let lines = split_lines(text);

    match obj {
        '(' | ')' | 'b' => bracket_object(&lines, pos, '(', ')', around),
        '[' | ']' => bracket_object(&lines, pos, '[', ']', around),
        '{' | '}' | 'B' => bracket_object(&lines, pos, '{', '}', around),
        '"' | '\'' | '`' => quote_object(&lines, pos, obj, around),
        'w' => word_object(&lines, pos, false, around),
        'W' => word_object(&lines, pos, true, around),
        _ => None,
    }
}

fn line_len(lines: &[&str], row: usize) -> usize {
    lines[row].chars().count()
}

fn char_at(lines: &[&str], pos: Position) -> Option<char> {
    lines[pos.row].chars().nth(pos.col)
}

fn step_forward(lines: &[&str], pos: Position) -> Option<Position> {
    if pos.col < line_len(lines, pos.row) {
        return Some(Position::new(pos.row, pos.col + 1));
    }
    if pos.row + 1 < lines.len() {
        return Some(Position::new(pos.row + 1, 0));
    }
    None
}

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

/// Innermost enclosing bracket block, searching across lines with nesting.
fn bracket_object(
    lines: &[&str],
    pos: Position,
    open: char,
    close: char,
    around: bool,
) -> Option<Range> {
    let opener = find_enclosing_opener(lines, pos, open, close)?;
    let closer = find_matching_closer(lines, opener, open, close)?;

    if around {
        return Some(Range::charwise(opener, closer, true));
    }

    let inner_start = step_forward(lines, opener)?;
    if inner_start == closer {
        // Empty block: an empty exclusive range, so operators are no-ops.
        return Some(Range::charwise(inner_start, inner_start, false));
    }
    let inner_end = step_back(lines, closer)?;
    Some(Range::charwise(inner_start, inner_end, true))
}

fn find_enclosing_opener(
    lines: &[&str],
    pos: Position,
    open: char,
    close: char,
) -> Option<Position> {
    // Cursor sitting on the opener counts as inside the block.
    if char_at(lines, pos) == Some(open) {
        return Some(pos);
    }

    let mut depth = 0i32;
    let mut cur = pos;
    loop {
        cur = step_back(lines, cur)?;
        match char_at(lines, cur) {
            Some(c) if c == close => depth += 1,
            Some(c) if c == open => {
                if depth == 0 {
                    return Some(cur);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
}

fn find_matching_closer(
    lines: &[&str],
    opener: Position,
    open: char,
    close: char,
) -> Option<Position> {
    let mut depth = 0i32;
    let mut cur = opener;
    loop {
        match char_at(lines, cur) {
            Some(c) if c == open => depth += 1,
            Some(c) if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(cur);
                }
            }
            _ => {}
        }
        cur = step_forward(lines, cur)?;
    }
}

/// Enclosing quoted span on the current line. Quote pairs are formed
/// left-to-right; a cursor past the last pair selects nothing.
fn quote_object(lines: &[&str], pos: Position, quote: char, around: bool) -> Option<Range> {
    let chars: Vec<char> = lines[pos.row].chars().collect();
    let indices: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == quote)
        .map(|(i, _)| i)
        .collect();

    // A cursor inside a pair selects it; a cursor before any pair selects
    // the next one on the line, as vim does.
    let (open, close) = indices
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .find(|(_, close)| pos.col <= *close)?;

    if around {
        // Trailing whitespace joins the object, as vim's `a"` takes it.
        let mut end = close;
        while chars.get(end + 1).is_some_and(|c| *c == ' ' || *c == '\t') {
            end += 1;
        }
        return Some(Range::charwise(
            Position::new(pos.row, open),
            Position::new(pos.row, end),
            true,
        ));
    }

    if open + 1 == close {
        return Some(Range::charwise(
            Position::new(pos.row, open + 1),
            Position::new(pos.row, open + 1),
            false,
        ));
    }

    Some(Range::charwise(
        Position::new(pos.row, open + 1),
        Position::new(pos.row, close - 1),
        true,
    ))
}

fn is_word_char(ch: char, big: bool) -> bool {
    if big {
        !ch.is_whitespace()
    } else {
        ch.is_alphanumeric() || ch == '_'
    }
}

/// Word (or WORD) under the cursor. On whitespace, the whitespace run is the
/// object.
fn word_object(lines: &[&str], pos: Position, big: bool, around: bool) -> Option<Range> {
    let chars: Vec<char> = lines[pos.row].chars().collect();
    if chars.is_empty() {
        return None;
    }

    let col = pos.col.min(chars.len() - 1);
    let on_space = chars[col].is_whitespace();

    let in_run = |c: char| {
        if on_space {
            c.is_whitespace()
        } else if is_word_char(chars[col], big) {
            is_word_char(c, big)
        } else {
            // Punctuation run for small words.
            !c.is_whitespace() && !is_word_char(c, big)
        }
    };

    let mut start = col;
    while start > 0 && in_run(chars[start - 1]) {
        start -= 1;
    }
    let mut end = col;
    while end + 1 < chars.len() && in_run(chars[end + 1]) {
        end += 1;
    }

    if around && !on_space {
        // Trailing whitespace first; fall back to leading.
        let mut wide_end = end;
        while wide_end + 1 < chars.len() && chars[wide_end + 1].is_whitespace() {
            wide_end += 1;
        }
        if wide_end == end {
            while start > 0 && chars[start - 1].is_whitespace() {
                start -= 1;
            }
        }
        end = wide_end;
    }

    Some(Range::charwise(
        Position::new(pos.row, start),
        Position::new(pos.row, end),
        true,
    ))
}
