//! Indentation-aware lexer for DwiSlpy source.
//!
//! The lexer is line-oriented: blank lines and comment-only lines vanish,
//! every other line contributes its tokens followed by a `Newline`, and
//! changes in leading-space depth are reported as `Indent`/`Dedent` tokens
//! driven by an indentation stack. Within a line, tokens are recognised with
//! winnow combinators over a `LocatingSlice` so each token knows its column.

use crate::util::{de_escape, Location};
use std::ops::Range;
use thiserror::Error;
use winnow::ascii::{digit1, space0};
use winnow::combinator::{alt, not, opt, repeat, terminated};
use winnow::prelude::*;
use winnow::stream::AsChar;
use winnow::token::{any, one_of, rest, take_while};
use winnow::LocatingSlice;

#[derive(Debug, PartialEq, Error)]
#[error("{location}: {message}")]
pub struct LexerError {
    pub message: String,
    pub location: Location,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    Keyword(Keyword),
    Name(String),
    Number(i64),
    StringLiteral(String),
    Plus,        // +
    Minus,       // -
    Star,        // *
    SlashSlash,  // //
    Percent,     // %
    LessThan,    // <
    LessOrEqual, // <=
    EqualEqual,  // ==
    Assign,      // =
    PlusAssign,  // +=
    MinusAssign, // -=
    TimesAssign, // *=
    Colon,       // :
    Arrow,       // ->
    Comma,       // ,
    OpenParen,   // (
    CloseParen,  // )
    Newline,
    Indent,
    Dedent,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Keyword {
    Def,
    If,
    Else,
    While,
    Return,
    Pass,
    Print,
    Input,
    Int,
    Str,
    Bool,
    None,
    True,
    False,
    And,
    Or,
    Not,
}

pub fn lex(input: &str, source_name: &str) -> Result<Vec<Token>, LexerError> {
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut line_count = 0;

    for (line_index, line) in input.lines().enumerate() {
        let line_number = line_index as i32 + 1;
        line_count = line_number;

        let indent_width = leading_indent(line, source_name, line_number)?;
        let body = &line[indent_width..];
        if body.is_empty() || body.starts_with('#') {
            continue;
        }

        adjust_indentation(
            indent_width,
            &mut indents,
            &mut tokens,
            source_name,
            line_number,
        )?;

        let spanned = line_tokens
            .parse(LocatingSlice::new(body))
            .map_err(|e| LexerError {
                message: "unrecognized token".to_string(),
                location: Location::new(
                    source_name,
                    line_number,
                    (indent_width + e.offset()) as i32 + 1,
                ),
            })?;

        for (kind, span) in spanned {
            tokens.push(Token {
                kind,
                location: Location::new(
                    source_name,
                    line_number,
                    (indent_width + span.start) as i32 + 1,
                ),
            });
        }

        tokens.push(Token {
            kind: TokenKind::Newline,
            location: Location::new(source_name, line_number, line.len() as i32 + 1),
        });
    }

    // Close any indentation levels still open at end of input.
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token {
            kind: TokenKind::Dedent,
            location: Location::new(source_name, line_count + 1, 1),
        });
    }

    Ok(tokens)
}

/// Counts leading spaces. Tabs in indentation are rejected so that depth
/// comparisons stay well defined.
fn leading_indent(line: &str, source_name: &str, line_number: i32) -> Result<usize, LexerError> {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => {
                return Err(LexerError {
                    message: "tab character in indentation".to_string(),
                    location: Location::new(source_name, line_number, width as i32 + 1),
                });
            }
            _ => break,
        }
    }
    Ok(width)
}

fn adjust_indentation(
    indent_width: usize,
    indents: &mut Vec<usize>,
    tokens: &mut Vec<Token>,
    source_name: &str,
    line_number: i32,
) -> Result<(), LexerError> {
    let current = indents.last().copied().unwrap_or(0);
    if indent_width > current {
        indents.push(indent_width);
        tokens.push(Token {
            kind: TokenKind::Indent,
            location: Location::new(source_name, line_number, 1),
        });
        return Ok(());
    }
    while indent_width < indents.last().copied().unwrap_or(0) {
        indents.pop();
        tokens.push(Token {
            kind: TokenKind::Dedent,
            location: Location::new(source_name, line_number, 1),
        });
    }
    if indent_width != indents.last().copied().unwrap_or(0) {
        return Err(LexerError {
            message: "dedent does not match any enclosing indentation level".to_string(),
            location: Location::new(source_name, line_number, 1),
        });
    }
    Ok(())
}

type LineInput<'a> = LocatingSlice<&'a str>;

fn line_tokens(input: &mut LineInput<'_>) -> winnow::Result<Vec<(TokenKind, Range<usize>)>> {
    let tokens = repeat(0.., spanned_token).parse_next(input)?;
    space0.parse_next(input)?;
    opt(comment).parse_next(input)?;
    Ok(tokens)
}

fn spanned_token(input: &mut LineInput<'_>) -> winnow::Result<(TokenKind, Range<usize>)> {
    space0.parse_next(input)?;
    token_kind.with_span().parse_next(input)
}

fn comment(input: &mut LineInput<'_>) -> winnow::Result<()> {
    ('#', rest).void().parse_next(input)
}

fn token_kind(input: &mut LineInput<'_>) -> winnow::Result<TokenKind> {
    alt((
        // words and literals, then two-character operators before their
        // one-character prefixes
        alt((word, number, string_literal)),
        alt((
            "//".value(TokenKind::SlashSlash),
            "+=".value(TokenKind::PlusAssign),
            "-=".value(TokenKind::MinusAssign),
            "*=".value(TokenKind::TimesAssign),
            "==".value(TokenKind::EqualEqual),
            "<=".value(TokenKind::LessOrEqual),
            "->".value(TokenKind::Arrow),
        )),
        alt((
            '+'.value(TokenKind::Plus),
            '-'.value(TokenKind::Minus),
            '*'.value(TokenKind::Star),
            '%'.value(TokenKind::Percent),
            '<'.value(TokenKind::LessThan),
            '='.value(TokenKind::Assign),
            ':'.value(TokenKind::Colon),
            ','.value(TokenKind::Comma),
            '('.value(TokenKind::OpenParen),
            ')'.value(TokenKind::CloseParen),
        )),
    ))
    .parse_next(input)
}

fn word(input: &mut LineInput<'_>) -> winnow::Result<TokenKind> {
    (
        take_while(1, |c: char| c.is_alpha() || c == '_'),
        take_while(0.., |c: char| c.is_alphanum() || c == '_'),
    )
        .take()
        .map(|w: &str| match w {
            "def" => TokenKind::Keyword(Keyword::Def),
            "if" => TokenKind::Keyword(Keyword::If),
            "else" => TokenKind::Keyword(Keyword::Else),
            "while" => TokenKind::Keyword(Keyword::While),
            "return" => TokenKind::Keyword(Keyword::Return),
            "pass" => TokenKind::Keyword(Keyword::Pass),
            "print" => TokenKind::Keyword(Keyword::Print),
            "input" => TokenKind::Keyword(Keyword::Input),
            "int" => TokenKind::Keyword(Keyword::Int),
            "str" => TokenKind::Keyword(Keyword::Str),
            "bool" => TokenKind::Keyword(Keyword::Bool),
            "None" => TokenKind::Keyword(Keyword::None),
            "True" => TokenKind::Keyword(Keyword::True),
            "False" => TokenKind::Keyword(Keyword::False),
            "and" => TokenKind::Keyword(Keyword::And),
            "or" => TokenKind::Keyword(Keyword::Or),
            "not" => TokenKind::Keyword(Keyword::Not),
            _ => TokenKind::Name(w.to_string()),
        })
        .parse_next(input)
}

// A number token must not run straight into a word character.
fn number(input: &mut LineInput<'_>) -> winnow::Result<TokenKind> {
    terminated(digit1, not(one_of(|c: char| c.is_alphanum() || c == '_')))
        .parse_to::<i64>()
        .map(TokenKind::Number)
        .parse_next(input)
}

fn string_literal(input: &mut LineInput<'_>) -> winnow::Result<TokenKind> {
    '"'.parse_next(input)?;
    let mut raw = String::new();
    loop {
        let c = any.parse_next(input)?;
        match c {
            '"' => break,
            '\\' => {
                let escaped = any.parse_next(input)?;
                raw.push('\\');
                raw.push(escaped);
            }
            _ => raw.push(c),
        }
    }
    Ok(TokenKind::StringLiteral(de_escape(&raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input, "test.slpy")
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_statement() {
        assert_eq!(
            kinds("x = 3 + 4\n"),
            vec![
                TokenKind::Name("x".into()),
                TokenKind::Assign,
                TokenKind::Number(3),
                TokenKind::Plus,
                TokenKind::Number(4),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_keywords_and_operators() {
        assert_eq!(
            kinds("while i <= 10:\n"),
            vec![
                TokenKind::Keyword(Keyword::While),
                TokenKind::Name("i".into()),
                TokenKind::LessOrEqual,
                TokenKind::Number(10),
                TokenKind::Colon,
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        let input = "while x:\n    x -= 1\nprint(x)\n";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Keyword(Keyword::While),
                TokenKind::Name("x".into()),
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Name("x".into()),
                TokenKind::MinusAssign,
                TokenKind::Number(1),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Keyword(Keyword::Print),
                TokenKind::OpenParen,
                TokenKind::Name("x".into()),
                TokenKind::CloseParen,
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_dangling_indent_closed_at_eof() {
        let input = "if x:\n    pass";
        let kinds = kinds(input);
        assert_eq!(kinds.last(), Some(&TokenKind::Dedent));
    }

    #[test]
    fn test_blank_lines_and_comments_skipped() {
        let input = "# a comment\n\nx = 1  # trailing\n";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Name("x".into()),
                TokenKind::Assign,
                TokenKind::Number(1),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#"s = "a\nb\"c""#),
            vec![
                TokenKind::Name("s".into()),
                TokenKind::Assign,
                TokenKind::StringLiteral("a\nb\"c".into()),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_token_locations() {
        let tokens = lex("x = 10\n", "t.slpy").unwrap();
        assert_eq!(tokens[0].location, Location::new("t.slpy", 1, 1));
        assert_eq!(tokens[1].location, Location::new("t.slpy", 1, 3));
        assert_eq!(tokens[2].location, Location::new("t.slpy", 1, 5));
    }

    #[test]
    fn test_inconsistent_dedent() {
        let input = "if x:\n        pass\n    pass\n";
        assert_matches!(
            lex(input, "t.slpy"),
            Err(LexerError { message, location })
                if message.contains("dedent") && location.line == 3
        );
    }

    #[test]
    fn test_tab_in_indentation() {
        assert_matches!(
            lex("\tpass\n", "t.slpy"),
            Err(LexerError { message, .. }) if message.contains("tab")
        );
    }

    #[test]
    fn test_number_boundary() {
        assert_matches!(lex("x = 12ab\n", "t.slpy"), Err(LexerError { .. }));
    }
}
