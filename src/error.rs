//! Source positions, spans and the closed error taxonomy shared by all
//! three pipeline stages. Every error carries the position or span of
//! the offending text, and parsing stops at the first one.

use std::fmt;

use thiserror::Error;

/// A 1-based line/column location in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Position {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open region of source text, from the start of the first
/// token to just past the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Span {
        Span { start, end }
    }

    pub fn point(pos: Position) -> Span {
        Span {
            start: pos,
            end: pos,
        }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParserError {
    #[error("unexpected character `{c}` at {pos}")]
    UnexpectedCharacter { c: char, pos: Position },

    #[error("unterminated {what} starting at {start}")]
    UnterminatedToken { what: &'static str, start: Position },

    #[error("unexpected end of input at {pos}")]
    UnexpectedEof { pos: Position },

    #[error("unexpected `{lexeme}` at {span}")]
    UnexpectedForm { lexeme: String, span: Span },

    #[error("expected {expected}, found `{found}` at {span}")]
    ExpectedForm {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("`{lexeme}` at {span} needs chapter {required}, but the ceiling is {chapter}")]
    DisallowedToken {
        lexeme: String,
        required: u32,
        chapter: u32,
        span: Span,
    },

    #[error("`{lexeme}` at {span} is not supported here")]
    UnsupportedToken { lexeme: String, span: Span },
}

impl ParserError {
    /// The source region the error points at.
    pub fn span(&self) -> Span {
        match *self {
            ParserError::UnexpectedCharacter { pos, .. } => Span::point(pos),
            ParserError::UnterminatedToken { start, .. } => Span::point(start),
            ParserError::UnexpectedEof { pos } => Span::point(pos),
            ParserError::UnexpectedForm { span, .. } => span,
            ParserError::ExpectedForm { span, .. } => span,
            ParserError::DisallowedToken { span, .. } => span,
            ParserError::UnsupportedToken { span, .. } => span,
        }
    }

    /// Renders the error with the offending source line and a caret
    /// column marker underneath it.
    pub fn report(&self, source: &str) -> String {
        let span = self.span();
        let mut out = format!("{}\n", self);

        let line_no = span.start.line as usize;
        if let Some(line) = source.lines().nth(line_no.saturating_sub(1)) {
            out.push_str(&format!("{:>4} | {}\n", line_no, line));
            let indent = span.start.column.saturating_sub(1) as usize;
            out.push_str(&format!("     | {}^\n", " ".repeat(indent)));
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merge_is_covering() {
        let a = Span::new(Position::new(1, 3), Position::new(1, 7));
        let b = Span::new(Position::new(1, 5), Position::new(2, 2));
        let merged = a.merge(b);
        assert_eq!(merged.start, Position::new(1, 3));
        assert_eq!(merged.end, Position::new(2, 2));
        assert_eq!(merged, b.merge(a));
    }

    #[test]
    fn report_places_caret() {
        let source = "(define x\n  12@)";
        let error = ParserError::UnexpectedCharacter {
            c: '@',
            pos: Position::new(2, 5),
        };
        let report = error.report(source);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[1], "   2 |   12@)");
        assert_eq!(lines[2], "     |     ^");
    }
}
