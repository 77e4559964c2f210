//! Per-card text checks: identifier naming and delimiter balance.
//!
//! The delimiter scan is purely structural. It does not tokenize, so a
//! bracket inside a string literal or comment is counted like any other
//! (`"let s = \")\";"` is reported unbalanced). Callers treat the result as
//! advisory.

use std::fmt;

/// `^[A-Za-z_][A-Za-z0-9_]*$`
pub fn validate_card_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn closer_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

fn is_closer(c: char) -> bool {
    matches!(c, ')' | ']' | '}')
}

/// Why a delimiter scan failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterFault {
    /// A closer that does not match the innermost open delimiter (or appears
    /// with nothing open). `offset` counts chars from the start of the code.
    Mismatched {
        found: char,
        expected: Option<char>,
        offset: usize,
    },
    /// The scan ended with delimiters still open; `expected` is the closer
    /// the innermost one is waiting for.
    Unclosed { open: usize, expected: char },
}

impl fmt::Display for DelimiterFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelimiterFault::Mismatched {
                found,
                expected: Some(expected),
                offset,
            } => write!(f, "found `{found}` at offset {offset}, expected `{expected}`"),
            DelimiterFault::Mismatched {
                found,
                expected: None,
                offset,
            } => write!(f, "unmatched `{found}` at offset {offset}"),
            DelimiterFault::Unclosed { open, expected } => {
                write!(f, "{open} delimiter(s) left open, next expected `{expected}`")
            }
        }
    }
}

/// Scan `code` keeping a stack of expected closers for `(`, `[` and `{`.
pub fn check_delimiters(code: &str) -> Result<(), DelimiterFault> {
    let mut expected: Vec<char> = Vec::new();
    for (offset, c) in code.chars().enumerate() {
        if let Some(closer) = closer_for(c) {
            expected.push(closer);
        } else if is_closer(c) {
            let top = expected.pop();
            if top != Some(c) {
                return Err(DelimiterFault::Mismatched {
                    found: c,
                    expected: top,
                    offset,
                });
            }
        }
    }
    match expected.last() {
        None => Ok(()),
        Some(&closer) => Err(DelimiterFault::Unclosed {
            open: expected.len(),
            expected: closer,
        }),
    }
}

pub fn validate_code_integrity(code: &str) -> bool {
    check_delimiters(code).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_names() {
        assert!(validate_card_name("loadUser"));
        assert!(validate_card_name("_private"));
        assert!(validate_card_name("x1_y2"));
        assert!(!validate_card_name(""));
        assert!(!validate_card_name("1st"));
        assert!(!validate_card_name("load-user"));
        assert!(!validate_card_name("load user"));
        assert!(!validate_card_name("café"));
    }

    #[test]
    fn balanced_code_passes() {
        assert!(validate_code_integrity("function f() { return [1,2]; }"));
        assert!(validate_code_integrity(""));
        assert!(validate_code_integrity("no delimiters at all"));
    }

    #[test]
    fn mismatched_closer_fails() {
        assert!(!validate_code_integrity("function f() { return [1,2);"));
        assert_eq!(
            check_delimiters("a(]"),
            Err(DelimiterFault::Mismatched {
                found: ']',
                expected: Some(')'),
                offset: 2
            })
        );
    }

    #[test]
    fn stray_closer_fails() {
        assert_eq!(
            check_delimiters("x)"),
            Err(DelimiterFault::Mismatched {
                found: ')',
                expected: None,
                offset: 1
            })
        );
    }

    #[test]
    fn unclosed_reports_innermost() {
        assert_eq!(
            check_delimiters("{ [ ("),
            Err(DelimiterFault::Unclosed {
                open: 3,
                expected: ')'
            })
        );
    }

    #[test]
    fn delimiters_in_strings_still_count() {
        assert!(!validate_code_integrity("const s = \")\";"));
    }
}
