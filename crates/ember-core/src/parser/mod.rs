//! Script front end: lexer, AST and recursive-descent parser
//!
//! The language is a small Ruby-flavoured subset: literals, locals, instance
//! variables, constants, method calls, `if`, `def`, `class`, and
//! `begin/rescue/else/ensure`.

pub mod ast;
pub mod lexer;
mod parse;

pub use parse::parse;

/// Syntax error with the line it was found on
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    /// Description
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
