//! Paren-structured grouping: turns the flat token sequence into a tree
//! of datums. No knowledge of special forms lives here.

use log::trace;

use crate::error::{ParserError, Position, Span};
use crate::lexer::{Token, TokenKind};

/// A datum is a balanced token tree: a single token, or a group of
/// nested datums.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Lexeme(Token),
    Group(Group),
}

impl Datum {
    pub fn span(&self) -> Span {
        match *self {
            Datum::Lexeme(ref token) => token.span(),
            Datum::Group(ref group) => group.span(),
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match *self {
            Datum::Lexeme(ref token) => Some(token),
            Datum::Group(_) => None,
        }
    }

    /// A short rendering for error messages: the token lexeme, or the
    /// leading lexeme of a group.
    pub fn text(&self) -> String {
        match *self {
            Datum::Lexeme(ref token) => token.lexeme.clone(),
            Datum::Group(ref group) => group
                .elements
                .first()
                .map(|d| d.text())
                .unwrap_or_default(),
        }
    }
}

/// An ordered sequence of datums.
///
/// Invariants, enforced at construction:
/// - never empty;
/// - parenthesized iff the first and last elements are a matching
///   open/close delimiter pair (round or square);
/// - an unparenthesized group is exactly an affector token followed by
///   its single target datum.
///
/// The span is derived from the first and last elements, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    elements: Vec<Datum>,
}

impl Group {
    /// Smart constructor. Validates the group invariants and collapses
    /// a singleton group to its inner element rather than wrapping it.
    /// `at` locates the construct for error reporting when the elements
    /// carry no usable span of their own.
    pub fn build(mut elements: Vec<Datum>, at: Position) -> Result<Datum, ParserError> {
        if elements.is_empty() {
            return Err(ParserError::UnexpectedEof { pos: at });
        }

        if elements.len() == 1 {
            return Ok(elements.remove(0));
        }

        let first_kind = elements.first().and_then(Datum::token).map(|t| t.kind);
        let last = elements.last().and_then(Datum::token);

        match first_kind {
            Some(kind) if kind.is_open_delimiter() => {
                let open = elements
                    .first()
                    .and_then(Datum::token)
                    .cloned()
                    .ok_or(ParserError::UnexpectedEof { pos: at })?;
                match last {
                    Some(close) if close.closes(&open) => {}
                    _ => {
                        let offender = elements.last().ok_or(ParserError::UnexpectedEof { pos: at })?;
                        return Err(ParserError::UnexpectedForm {
                            lexeme: offender.text(),
                            span: offender.span(),
                        });
                    }
                }
            }
            Some(kind) if kind.is_affector() => {
                if elements.len() != 2 {
                    let offender = &elements[2];
                    return Err(ParserError::UnexpectedForm {
                        lexeme: offender.text(),
                        span: offender.span(),
                    });
                }
            }
            _ => {
                let offender = &elements[0];
                return Err(ParserError::UnexpectedForm {
                    lexeme: offender.text(),
                    span: offender.span(),
                });
            }
        }

        Ok(Datum::Group(Group { elements }))
    }

    pub fn span(&self) -> Span {
        let first = self
            .elements
            .first()
            .map(Datum::span)
            .unwrap_or_else(|| Span::point(Position::new(1, 1)));
        let last = self.elements.last().map(Datum::span).unwrap_or(first);
        first.merge(last)
    }

    /// True when the group is wrapped in a delimiter pair, false for an
    /// affector group.
    pub fn is_parenthesized(&self) -> bool {
        self.elements
            .first()
            .and_then(Datum::token)
            .map(|t| t.kind.is_open_delimiter())
            .unwrap_or(false)
    }

    pub fn elements(&self) -> &[Datum] {
        &self.elements
    }

    /// The elements with the enclosing delimiter pair stripped, or the
    /// affector pair as-is.
    pub fn into_inner(self) -> Vec<Datum> {
        let mut elements = self.elements;
        if elements
            .first()
            .and_then(Datum::token)
            .map(|t| t.kind.is_open_delimiter())
            .unwrap_or(false)
        {
            elements.pop();
            elements.remove(0);
        }
        elements
    }
}

/// Consumes tokens and produces the datum tree.
pub struct Grouper {
    tokens: Vec<Token>,
    index: usize,
}

impl Grouper {
    pub fn new(tokens: Vec<Token>) -> Grouper {
        Grouper { tokens, index: 0 }
    }

    /// Drives `read` over the whole token sequence, yielding every
    /// top-level datum in order.
    pub fn read_all(mut self) -> Result<Vec<Datum>, ParserError> {
        let mut data = Vec::new();
        while let Some(datum) = self.read(None)? {
            trace!("datum at {}", datum.span());
            data.push(datum);
        }
        Ok(data)
    }

    fn advance(&mut self) -> Token {
        let token = match self.tokens.get(self.index) {
            Some(t) => t.clone(),
            // scan() always terminates the sequence with Eof
            None => {
                let end = self
                    .tokens
                    .last()
                    .map(|t| t.end)
                    .unwrap_or_else(|| Position::new(1, 1));
                Token::new(TokenKind::Eof, String::new(), None, end, end)
            }
        };
        self.index += 1;
        token
    }

    /// Reads one datum. Inside a delimiter pair (`opener` present) the
    /// level runs until the matching close; at the top level it stops
    /// after a single element. `Ok(None)` means the remaining input was
    /// nothing but datum comments (or empty).
    fn read(&mut self, opener: Option<&Token>) -> Result<Option<Datum>, ParserError> {
        let mut elements: Vec<Datum> = Vec::new();
        let mut at = opener.map(|t| t.start);
        if let Some(open) = opener {
            elements.push(Datum::Lexeme(open.clone()));
        }

        loop {
            let token = self.advance();
            if at.is_none() {
                at = Some(token.start);
            }

            match token.kind {
                kind if kind.is_open_delimiter() => {
                    match self.read(Some(&token))? {
                        Some(inner) => elements.push(inner),
                        None => return Err(ParserError::UnexpectedEof { pos: token.end }),
                    }
                }

                kind if kind.is_close_delimiter() => match opener {
                    Some(open) if token.closes(open) => {
                        elements.push(Datum::Lexeme(token));
                        break;
                    }
                    _ => {
                        // stray or mismatched close delimiter
                        return Err(ParserError::UnexpectedForm {
                            lexeme: token.lexeme.clone(),
                            span: token.span(),
                        });
                    }
                },

                kind if kind.is_affector() => {
                    let target = match self.read(None)? {
                        Some(datum) => datum,
                        None => return Err(ParserError::UnexpectedEof { pos: token.end }),
                    };
                    let group = Group::build(vec![Datum::Lexeme(token), target], at.unwrap_or_else(|| Position::new(1, 1)))?;
                    elements.push(group);
                }

                TokenKind::DatumComment => match self.read(None)? {
                    Some(_) => continue,
                    None => return Err(ParserError::UnexpectedEof { pos: token.end }),
                },

                TokenKind::Eof => {
                    if opener.is_some() {
                        return Err(ParserError::UnexpectedEof { pos: token.start });
                    }
                    if elements.is_empty() {
                        return Ok(None);
                    }
                    // the top-level loop exits right after its single
                    // element, so Eof can only be seen with none
                    return Err(ParserError::UnexpectedEof { pos: token.start });
                }

                // literals, identifiers and keywords pass through
                _ => elements.push(Datum::Lexeme(token)),
            }

            if opener.is_none() && !elements.is_empty() {
                break;
            }
        }

        let at = at.unwrap_or_else(|| Position::new(1, 1));
        Group::build(elements, at).map(Some)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ParserError;
    use crate::lexer::scan;

    fn read_all(code: &str) -> Result<Vec<Datum>, ParserError> {
        Grouper::new(scan(code).expect("scannable")).read_all()
    }

    fn read_one(code: &str) -> Datum {
        let mut data = read_all(code).expect("groupable");
        assert_eq!(data.len(), 1);
        data.remove(0)
    }

    fn group(datum: Datum) -> Group {
        match datum {
            Datum::Group(g) => g,
            other => panic!("expected a group, got {:?}", other),
        }
    }

    #[test]
    fn single_token_collapses() {
        match read_one("42") {
            Datum::Lexeme(token) => assert_eq!(token.lexeme, "42"),
            other => panic!("expected a lexeme, got {:?}", other),
        }
    }

    #[test]
    fn flat_list() {
        let g = group(read_one("(+ 1 2)"));
        assert!(g.is_parenthesized());
        // open, three lexemes, close
        assert_eq!(g.elements().len(), 5);
    }

    #[test]
    fn brackets_interchangeable() {
        let g = group(read_one("[+ 1 2]"));
        assert!(g.is_parenthesized());
        assert_eq!(g.into_inner().len(), 3);
    }

    #[test]
    fn nesting() {
        let g = group(read_one("(a (b c))"));
        let inner = g.into_inner();
        assert_eq!(inner.len(), 2);
        assert!(group(inner[1].clone()).is_parenthesized());
    }

    #[test]
    fn mismatched_delimiters() {
        match read_all("(a]") {
            Err(ParserError::UnexpectedForm { lexeme, .. }) => assert_eq!(lexeme, "]"),
            other => panic!("expected UnexpectedForm, got {:?}", other),
        }
    }

    #[test]
    fn affector_attaches_to_next_datum() {
        let g = group(read_one("'x"));
        assert!(!g.is_parenthesized());
        let elements = g.into_inner();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].token().map(|t| t.kind), Some(TokenKind::Quote));
    }

    #[test]
    fn affector_skips_datum_comment() {
        // the quote must claim `y`, not the commented-out `x`
        let g = group(read_one("'#;x y"));
        let elements = g.into_inner();
        assert_eq!(elements[1].token().map(|t| &t.lexeme[..]), Some("y"));
    }

    #[test]
    fn datum_comment_discards_whole_datum() {
        let data = read_all("#;(a (b)) 42").expect("groupable");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].token().map(|t| &t.lexeme[..]), Some("42"));
    }

    #[test]
    fn datum_comment_only_input_is_empty() {
        assert_eq!(read_all("#;(a b)"), Ok(vec![]));
    }

    #[test]
    fn stray_close() {
        match read_all(")") {
            Err(ParserError::UnexpectedForm { lexeme, span }) => {
                assert_eq!(lexeme, ")");
                assert_eq!(span.start.column, 1);
            }
            other => panic!("expected UnexpectedForm, got {:?}", other),
        }
    }

    #[test]
    fn unbalanced_open() {
        match read_all("(") {
            Err(ParserError::UnexpectedEof { pos }) => assert_eq!(pos.column, 2),
            other => panic!("expected UnexpectedEof, got {:?}", other),
        }
    }

    #[test]
    fn dangling_affector() {
        assert!(matches!(
            read_all("'"),
            Err(ParserError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn group_span_covers_delimiters() {
        let g = group(read_one("(a\n b)"));
        let span = g.span();
        assert_eq!(span.start, Position::new(1, 1));
        assert_eq!(span.end, Position::new(2, 4));
    }

    #[test]
    fn regrouping_flattened_tokens_is_idempotent() {
        fn flatten(datum: &Datum, out: &mut Vec<Token>) {
            match datum {
                Datum::Lexeme(token) => out.push(token.clone()),
                Datum::Group(group) => {
                    for element in group.elements() {
                        flatten(element, out);
                    }
                }
            }
        }

        let data = read_all("(define (f x) '(1 . 2)) #(a b)").expect("groupable");
        let mut tokens = Vec::new();
        for datum in &data {
            flatten(datum, &mut tokens);
        }
        let end = tokens.last().map(|t| t.end).unwrap_or(Position::new(1, 1));
        tokens.push(Token::new(TokenKind::Eof, String::new(), None, end, end));

        let regrouped = Grouper::new(tokens).read_all().expect("groupable");
        assert_eq!(regrouped, data);
    }
}
