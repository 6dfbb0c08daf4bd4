//! Lexer for Ember scripts, built on logos.
//!
//! Newlines are significant (they terminate statements) so they are emitted
//! as tokens; the parser skips them where an expression obviously continues.

use super::ParseError;
use logos::Logos;
use std::ops::Range;

/// Script token
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\n")]
pub enum Token {
    #[token("\n")]
    Newline,

    #[token(";")]
    Semicolon,

    // Keywords (must win over identifiers of the same length)
    #[token("def")]
    Def,

    #[token("class")]
    Class,

    #[token("end")]
    End,

    #[token("if")]
    If,

    #[token("elsif")]
    Elsif,

    #[token("else")]
    Else,

    #[token("then")]
    Then,

    #[token("begin")]
    Begin,

    #[token("rescue")]
    Rescue,

    #[token("ensure")]
    Ensure,

    #[token("self")]
    SelfKw,

    #[token("nil")]
    Nil,

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[regex(r"[a-z_][a-zA-Z0-9_]*[?!]?", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[A-Z][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Constant(String),

    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ivar(String),

    #[regex(r"[0-9][0-9_]*", parse_int)]
    Int(i64),

    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    #[regex(r"'([^'\\]|\\.)*'", parse_string)]
    Str(String),

    // Operators (longest match wins)
    #[token("==")]
    EqualEqual,

    #[token("!=")]
    BangEqual,

    #[token("<=")]
    LessEqual,

    #[token(">=")]
    GreaterEqual,

    #[token("&&")]
    AmpAmp,

    #[token("||")]
    PipePipe,

    #[token("=>")]
    Arrow,

    #[token("=")]
    Equal,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("<")]
    Less,

    #[token(">")]
    Greater,

    #[token("!")]
    Bang,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().replace('_', "").parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let s = lex.slice();
    let quote = s.chars().next()?;
    let inner = &s[1..s.len() - 1];
    Some(unescape(inner, quote == '"'))
}

fn unescape(s: &str, interpolating: bool) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') if interpolating => out.push('"'),
            Some('n') if interpolating => out.push('\n'),
            Some('t') if interpolating => out.push('\t'),
            Some('r') if interpolating => out.push('\r'),
            Some('0') if interpolating => out.push('\0'),
            Some('e') if interpolating => out.push('\x1b'),
            Some(other) => {
                // Unknown escapes keep the backslash in single quotes only
                if !interpolating {
                    out.push('\\');
                }
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Token with its byte range in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token
    pub token: Token,
    /// Byte range
    pub span: Range<usize>,
}

/// 1-based line number of a byte offset
pub fn line_of(src: &str, offset: usize) -> usize {
    src.as_bytes()[..offset.min(src.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Split source into tokens
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut lexer = Token::lexer(src);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push(Spanned { token, span }),
            Err(()) => {
                return Err(ParseError::new(
                    line_of(src, span.start),
                    format!("unexpected character '{}'", &src[span.clone()]),
                ))
            }
        }
    }

    Ok(tokens)
}
