//! Minimal SQL text handling: statement splitting, sentinel detection, and
//! leading-keyword classification.
//!
//! This is deliberately not a parser. The splitter is a character walker that
//! honors quoted literals and line comments and nothing else; dialect
//! constructs such as `$$`-quoted bodies or nested `BEGIN/END` blocks are
//! split naively.

/// Split a script into individual statements on `;`.
///
/// Semicolons inside single-quoted, double-quoted, or backtick-quoted spans
/// and after `--` line comments do not split. Empty fragments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_line_comment = false;

    while let Some(ch) = chars.next() {
        if in_line_comment {
            current.push(ch);
            if ch == '\n' {
                in_line_comment = false;
            }
            continue;
        }

        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    // Doubled quote stays inside the literal.
                    if q == '\'' && chars.peek() == Some(&'\'') {
                        current.push(chars.next().unwrap());
                    } else {
                        quote = None;
                    }
                }
            }
            None => match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '-' if chars.peek() == Some(&'-') => {
                    in_line_comment = true;
                    current.push(ch);
                    current.push(chars.next().unwrap());
                }
                ';' => {
                    let trimmed = current.trim();
                    if !trimmed.is_empty() {
                        statements.push(trimmed.to_string());
                    }
                    current.clear();
                }
                _ => current.push(ch),
            },
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }

    statements
}

/// Strip leading whitespace, `--` line comments, and `/* */` block comments.
pub fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("--") {
            match after.find('\n') {
                Some(idx) => rest = &after[idx + 1..],
                None => return "",
            }
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            match after.find("*/") {
                Some(idx) => rest = &after[idx + 2..],
                None => return "",
            }
        } else {
            return trimmed;
        }
    }
}

/// First keyword of a statement, lowercased, comments skipped.
pub fn leading_keyword(sql: &str) -> String {
    strip_leading_comments(sql)
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Whether a statement is expected to produce rows.
pub fn is_row_returning(sql: &str) -> bool {
    matches!(
        leading_keyword(sql).as_str(),
        "select" | "with" | "show" | "explain" | "describe" | "pragma" | "values"
    )
}

/// Transaction control sentinels recognized by the transaction executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionSentinel {
    Begin,
    Commit,
    Rollback,
}

/// Detect a transaction sentinel statement.
///
/// Case-insensitive; leading whitespace and comments are stripped first.
/// `BEGIN`/`START TRANSACTION` begin, `COMMIT`/`END` commit, `ROLLBACK`
/// rolls back.
pub fn transaction_sentinel(sql: &str) -> Option<TransactionSentinel> {
    let stripped = strip_leading_comments(sql);
    let mut words = stripped.split_whitespace();
    let first = words.next()?.to_lowercase();

    match first.as_str() {
        "begin" => Some(TransactionSentinel::Begin),
        "start" => {
            let second = words.next()?.to_lowercase();
            (second == "transaction").then_some(TransactionSentinel::Begin)
        }
        "commit" | "end" => Some(TransactionSentinel::Commit),
        "rollback" => Some(TransactionSentinel::Rollback),
        _ => None,
    }
}

/// Target of a `USE <database>` statement, with optional quoting stripped.
pub fn use_target(sql: &str) -> Option<String> {
    let stripped = strip_leading_comments(sql);
    let mut words = stripped.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("use") {
        return None;
    }

    let raw = words.next()?.trim_end_matches(';');
    let name = raw
        .trim_matches('`')
        .trim_matches('"')
        .trim_start_matches('[')
        .trim_end_matches(']');

    (!name.is_empty()).then(|| name.to_string())
}
