//! Parser frontend for a staged Scheme dialect.
//!
//! Source text goes through three stages:
//!
//! 1. the scanner ([`scan`]) turns characters into tokens with exact
//!    line/column spans;
//! 2. the grouper ([`Grouper`]) builds a balanced datum tree out of the
//!    token sequence, attaching prefix affectors and dropping datum
//!    comments;
//! 3. the semantic parser ([`Parser`]) walks the tree with a quote-mode
//!    state and a chapter ceiling and produces the typed AST.
//!
//! [`parse`] runs all three. The chapter ceiling gates later-chapter
//! constructs (quotation, mutation) behind a positive rank so the same
//! grammar serves every teaching stage.

mod error;
mod lexer;
mod parser;
mod reader;

pub use crate::error::{ParserError, Position, Span};
pub use crate::lexer::{keyword, scan, Literal, Token, TokenKind};
pub use crate::parser::{
    Binding, CondClause, ExprKind, Expression, Parser, BASE_CHAPTER, MUTATION_CHAPTER,
    QUOTING_CHAPTER,
};
pub use crate::reader::{Datum, Group, Grouper};

/// Runs the full pipeline over `source` under the given chapter
/// ceiling, yielding one expression per top-level datum.
pub fn parse(source: &str, chapter: u32) -> Result<Vec<Expression>, ParserError> {
    let tokens = lexer::scan(source)?;
    let data = reader::Grouper::new(tokens).read_all()?;
    parser::Parser::new(chapter).parse(data)
}

/// [`parse`] with every chapter enabled.
pub fn parse_unbounded(source: &str) -> Result<Vec<Expression>, ParserError> {
    parse(source, u32::MAX)
}
