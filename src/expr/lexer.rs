//! Tokenizer for the filter expression language.
//!
//! Whitespace is insignificant outside quoted strings; `#` starts a comment
//! running to end-of-line. Every token carries the byte offset of its first
//! character so parse errors can point back into the input.

use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use super::error::FilterError;

/// Token types for the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Plain identifier: keyword, bare string, or the regex `i` flag.
    Ident(String),
    /// Single- or double-quoted string.
    Str(String),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// Attribute name without the leading `@`.
    Attr(String),

    // Integer comparison (== and != double as string comparison)
    EqEq,   // ==
    NotEq,  // !=
    Lt,     // <
    LtEq,   // <=
    Gt,     // >
    GtEq,   // >=

    // String comparison
    PrefixEq,    // =^
    PrefixNotEq, // !^
    Match,       // =~
    NotMatch,    // !~

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,

    /// End of input, at offset == input length.
    Eof,
}

// Manually define PResult for resilience against winnow version changes
type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

fn backtrack() -> winnow::error::ErrMode<winnow::error::ContextError> {
    winnow::error::ErrMode::Backtrack(winnow::error::ContextError::default())
}

/// Skip whitespace and `#` line comments.
fn skip_trivia(input: &mut &str) {
    loop {
        let trimmed = input.trim_start_matches([' ', '\t', '\r', '\n']);
        match trimmed.strip_prefix('#') {
            Some(comment) => {
                let end = comment.find('\n').map(|i| i + 1).unwrap_or(comment.len());
                *input = &comment[end..];
            }
            None => {
                *input = trimmed;
                return;
            }
        }
    }
}

/// Lex a plain identifier: `[A-Za-z][A-Za-z0-9:_]*`.
fn lex_ident(input: &mut &str) -> PResult<Token> {
    let first = take_while(1.., |c: char| c.is_ascii_alphabetic()).parse_next(input)?;
    let rest = take_while(0.., |c: char| {
        c.is_ascii_alphanumeric() || c == ':' || c == '_'
    })
    .parse_next(input)?;
    Ok(Token::Ident(format!("{first}{rest}")))
}

/// Lex `@name`. The name itself is validated by the parser.
fn lex_attr(input: &mut &str) -> PResult<Token> {
    let _ = '@'.parse_next(input)?;
    let name = take_while(1.., |c: char| c.is_ascii_lowercase() || c == '_').parse_next(input)?;
    Ok(Token::Attr(name.to_string()))
}

/// Lex a signed decimal integer.
fn lex_int(input: &mut &str) -> PResult<Token> {
    let sign = opt(one_of(['+', '-'])).parse_next(input)?;
    let digits = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let full = match sign {
        Some(sign) => format!("{sign}{digits}"),
        None => digits.to_string(),
    };
    let value: i64 = full.parse().map_err(|_| backtrack())?;
    Ok(Token::Int(value))
}

/// Lex a quoted string. No escape processing; the delimiter simply cannot
/// appear inside the literal.
fn lex_quoted(input: &mut &str) -> PResult<Token> {
    let quote = one_of(['\'', '"']).parse_next(input)?;
    let body = take_while(0.., move |c: char| c != quote).parse_next(input)?;
    let _ = one_of(move |c: char| c == quote).parse_next(input)?;
    Ok(Token::Str(body.to_string()))
}

fn lex_operator(input: &mut &str) -> PResult<Token> {
    alt((
        // Multi-char operators first
        "==".value(Token::EqEq),
        "!=".value(Token::NotEq),
        "<=".value(Token::LtEq),
        ">=".value(Token::GtEq),
        "=^".value(Token::PrefixEq),
        "!^".value(Token::PrefixNotEq),
        "=~".value(Token::Match),
        "!~".value(Token::NotMatch),
        // Single-char operators and punctuation
        "<".value(Token::Lt),
        ">".value(Token::Gt),
        "(".value(Token::LParen),
        ")".value(Token::RParen),
        "[".value(Token::LBracket),
        "]".value(Token::RBracket),
        ",".value(Token::Comma),
    ))
    .parse_next(input)
}

fn lex_token(input: &mut &str) -> PResult<Token> {
    alt((lex_operator, lex_attr, lex_quoted, lex_int, lex_ident)).parse_next(input)
}

/// Tokenize the entire input. The returned vector always ends with an
/// `Eof` token at offset `input.len()`.
pub fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, FilterError> {
    let mut remaining = input;
    let mut tokens = Vec::new();

    loop {
        skip_trivia(&mut remaining);
        let offset = input.len() - remaining.len();
        if remaining.is_empty() {
            tokens.push((Token::Eof, offset));
            return Ok(tokens);
        }
        match lex_token(&mut remaining) {
            Ok(token) => tokens.push((token, offset)),
            Err(_) => {
                return Err(FilterError::Parse {
                    offset,
                    expected: "a valid token".to_string(),
                });
            }
        }
    }
}
