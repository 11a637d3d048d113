//! Source locations and string-literal escape handling.

use std::fmt;

/// A place in a DwiSlpy source file, used when reporting errors.
///
/// A `line` of zero or less means the position within the file is unknown
/// and only the file name is reported.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Location {
    pub source_name: String,
    pub line: i32,
    pub column: i32,
}

impl Location {
    pub fn new(source_name: impl Into<String>, line: i32, column: i32) -> Self {
        Location {
            source_name: source_name.into(),
            line,
            column,
        }
    }

    /// A location that names the file but no position within it.
    pub fn whole_file(source_name: impl Into<String>) -> Self {
        Location {
            source_name: source_name.into(),
            line: -1,
            column: -1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 && self.column > 0 {
            write!(f, "{}:{}:{}", self.source_name, self.line, self.column)
        } else {
            write!(f, "{}", self.source_name)
        }
    }
}

/// Replaces `\n`, `\t`, `\\` and `\"` escape sequences with the characters
/// they stand for. Any other escaped character is taken literally.
pub fn de_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// The inverse of [`de_escape`]: replaces special characters with their
/// backslash escape sequences, suitable for quoting in source or `.asciiz`.
pub fn re_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let locn = Location::new("prog.slpy", 3, 7);
        assert_eq!(locn.to_string(), "prog.slpy:3:7");

        let unknown = Location::whole_file("prog.slpy");
        assert_eq!(unknown.to_string(), "prog.slpy");
    }

    #[test]
    fn test_de_escape() {
        assert_eq!(de_escape(r"a\nb\tc"), "a\nb\tc");
        assert_eq!(de_escape(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(de_escape(r"back\\slash"), "back\\slash");
    }

    #[test]
    fn test_re_escape() {
        assert_eq!(re_escape("a\nb\tc"), r"a\nb\tc");
        assert_eq!(re_escape("say \"hi\""), r#"say \"hi\""#);
    }

    #[test]
    fn test_escape_round_trip() {
        let original = "line one\n\t\"quoted\"\\done";
        assert_eq!(de_escape(&re_escape(original)), original);
    }
}
