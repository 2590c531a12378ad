use std::fmt;

use crate::error::{AppError, Result};
use crate::keyspace::record::KeyName;

/// Glob-style key match pattern (`user:*`, `session:??`, `cache:[^x]*`, `a\*b`).
///
/// Compiled once; the raw text is kept so it can be forwarded to the scan
/// primitive as its match filter.
#[derive(Clone)]
pub struct KeyPattern {
    raw: String,
    compiled: glob::Pattern,
}

impl KeyPattern {
    pub fn new(raw: &str) -> Result<Self> {
        let compiled = glob::Pattern::new(&translate(raw))
            .map_err(|e| AppError::InvalidPattern(format!("{}: {}", raw, e.msg)))?;
        Ok(Self {
            raw: raw.to_string(),
            compiled,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, name: &KeyName) -> bool {
        self.compiled.matches(&name.to_str_lossy())
    }
}

impl fmt::Debug for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyPattern").field(&self.raw).finish()
    }
}

impl PartialEq for KeyPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

/// Rewrite keyspace match syntax into `glob` syntax: `[^..]` becomes `[!..]`,
/// backslash escapes become single-character classes and runs of `*`
/// collapse (glob rejects `**` inside a component).
fn translate(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) if in_class => out.push(escaped),
                Some(escaped @ ('*' | '?' | '[' | ']')) => {
                    out.push('[');
                    out.push(escaped);
                    out.push(']');
                }
                Some(escaped) => out.push(escaped),
                None => out.push_str("[\\]"),
            },
            '[' if !in_class => {
                in_class = true;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('!');
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '*' if !in_class => {
                out.push('*');
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, name: &str) -> bool {
        KeyPattern::new(pattern).unwrap().matches(&KeyName::from(name))
    }

    #[test]
    fn star_matches_across_delimiters() {
        assert!(matches("user:*", "user:1:profile"));
        assert!(matches("*profile", "user:1:profile"));
        assert!(!matches("user:*", "session:1"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        assert!(matches("s?t", "set"));
        assert!(!matches("s?t", "seat"));
    }

    #[test]
    fn negated_class_uses_caret() {
        assert!(matches("h[^e]llo", "hallo"));
        assert!(!matches("h[^e]llo", "hello"));
        assert!(matches("h[ae]llo", "hello"));
    }

    #[test]
    fn escaped_wildcard_is_literal() {
        assert!(matches("a\\*b", "a*b"));
        assert!(!matches("a\\*b", "axb"));
    }

    #[test]
    fn repeated_stars_collapse() {
        assert!(matches("a**b", "a:x:b"));
        assert_eq!(translate("a***b"), "a*b");
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = KeyPattern::new("[abc").unwrap_err();
        assert!(matches!(err, AppError::InvalidPattern(_)));
    }
}
