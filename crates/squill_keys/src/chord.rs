use std::fmt;

/// Keyboard modifiers, terminal-flavored: no platform key, since terminals
/// do not deliver one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Default::default()
        }
    }

    pub fn has_any(&self) -> bool {
        self.ctrl || self.alt || self.shift
    }
}

/// A normalized key chord for keymap lookup.
///
/// Key names are lowercased and terminal aliases collapsed (`esc` ==
/// `escape`). Printable characters keep their case, so `N` and `n` are
/// distinct bindings without a shift modifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: Self::normalize_key(&key.into()),
            modifiers,
        }
    }

    /// A bare printable key.
    pub fn plain(key: impl Into<String>) -> Self {
        Self::new(key, Modifiers::none())
    }

    /// Parse a chord from a binding string like "ctrl+z" or "N".
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = s.split('+').collect();
        let key_part = *parts.last().ok_or(ParseError::Empty)?;

        let mut modifiers = Modifiers::default();
        for part in &parts[..parts.len() - 1] {
            match part.to_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                other => return Err(ParseError::InvalidModifier(other.to_string())),
            }
        }

        let key = Self::normalize_key(key_part);
        if key.is_empty() {
            return Err(ParseError::Empty);
        }

        Ok(Self { key, modifiers })
    }

    fn normalize_key(key: &str) -> String {
        // Single printable characters keep their case.
        if key.chars().count() == 1 {
            return key.to_string();
        }

        match key.to_lowercase().as_str() {
            "esc" | "escape" => "escape".to_string(),
            "return" | "enter" => "enter".to_string(),
            "spacebar" | "space" => "space".to_string(),
            "del" | "delete" => "delete".to_string(),
            "question_mark" => "?".to_string(),
            "slash" => "/".to_string(),
            other => other.to_string(),
        }
    }

    /// The single printable character of this chord, if it is one.
    pub fn printable(&self) -> Option<char> {
        if self.modifiers.has_any() {
            return None;
        }
        match self.key.as_str() {
            "space" => Some(' '),
            key => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Some(ch),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            return write!(f, "^{}", self.key);
        }
        if self.modifiers.alt {
            write!(f, "alt+")?;
        }
        if self.modifiers.shift {
            write!(f, "shift+")?;
        }

        match self.key.as_str() {
            "space" => write!(f, "<space>"),
            "escape" => write!(f, "esc"),
            key => write!(f, "{}", key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    InvalidModifier(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty key chord"),
            ParseError::InvalidModifier(m) => write!(f, "invalid modifier: {}", m),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_key() {
        let chord = KeyChord::parse("j").unwrap();
        assert_eq!(chord.key, "j");
        assert!(!chord.modifiers.has_any());
    }

    #[test]
    fn parse_with_modifiers() {
        let chord = KeyChord::parse("ctrl+z").unwrap();
        assert_eq!(chord.key, "z");
        assert!(chord.modifiers.ctrl);
    }

    #[test]
    fn printable_case_is_preserved() {
        assert_ne!(KeyChord::plain("n"), KeyChord::plain("N"));
        assert_eq!(KeyChord::plain("N").printable(), Some('N'));
    }

    #[test]
    fn aliases_normalize() {
        assert_eq!(KeyChord::parse("esc").unwrap().key, "escape");
        assert_eq!(KeyChord::parse("slash").unwrap().key, "/");
    }

    #[test]
    fn display_uses_caret_for_ctrl() {
        assert_eq!(KeyChord::parse("ctrl+q").unwrap().to_string(), "^q");
        assert_eq!(KeyChord::plain("space").to_string(), "<space>");
    }
}
