//! Wildcard matching for enumeration patterns.
//!
//! `*` matches any run of characters, `?` matches exactly one, and the
//! legacy `*.*` form matches every name, including names without a dot.

use regex::{Regex, RegexBuilder};

use crate::config::CaseSensitivity;
use crate::error::{FsError, FsResult};

/// True when `name` contains wildcard characters.
pub fn is_wildcard(name: &str) -> bool {
    name.contains(['*', '?'])
}

/// A compiled name pattern
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str, case: CaseSensitivity) -> FsResult<Self> {
        if pattern.is_empty() {
            return Err(FsError::InvalidName);
        }

        let effective = if pattern == "*.*" { "*" } else { pattern };
        let mut expr = String::with_capacity(effective.len() * 2 + 2);
        expr.push('^');
        for ch in effective.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => {
                    let mut buf = [0u8; 4];
                    expr.push_str(&regex::escape(other.encode_utf8(&mut buf)));
                }
            }
        }
        expr.push('$');

        let regex = RegexBuilder::new(&expr)
            .case_insensitive(case == CaseSensitivity::InsensitivePreserving)
            .dot_matches_new_line(true)
            .build()
            .map_err(|_| FsError::InvalidName)?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn is_wildcard(&self) -> bool {
        is_wildcard(&self.source)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insensitive(p: &str) -> NamePattern {
        NamePattern::new(p, CaseSensitivity::InsensitivePreserving).unwrap()
    }

    #[test]
    fn test_star_and_extension() {
        let all = insensitive("*");
        assert!(all.matches("a.txt"));
        assert!(all.matches("."));
        assert!(all.matches(".."));

        let txt = insensitive("*.txt");
        assert!(txt.matches("notes.TXT"));
        assert!(!txt.matches("notes.log"));
        assert!(!txt.matches("txt"));
    }

    #[test]
    fn test_star_dot_star_matches_names_without_dot() {
        let p = insensitive("*.*");
        assert!(p.matches("Makefile"));
        assert!(p.matches("a.b"));
    }

    #[test]
    fn test_question_mark_is_single_char() {
        let p = insensitive("file?.txt");
        assert!(p.matches("file1.txt"));
        assert!(!p.matches("file.txt"));
        assert!(!p.matches("file12.txt"));
    }

    #[test]
    fn test_literal_regex_metacharacters() {
        let p = insensitive("a+b(1).txt");
        assert!(p.matches("a+b(1).txt"));
        assert!(!p.matches("aab1.txt"));
    }

    #[test]
    fn test_case_sensitive_mode() {
        let p = NamePattern::new("Name.*", CaseSensitivity::Sensitive).unwrap();
        assert!(p.matches("Name.txt"));
        assert!(!p.matches("name.txt"));
        assert!(p.is_wildcard());
    }
}
