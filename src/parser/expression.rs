//! Semantic parsing: walks the datum tree with a quote-mode state and a
//! chapter ceiling, producing the typed AST.
//!
//! The quote mode is the central contract of the grammar: the same
//! lexeme denotes a variable reference outside quotation and an opaque
//! name inside it. The mode machine has exactly three states with a
//! well-defined transition/restore pair around every affector.

use log::{debug, trace};

use super::keywords;
use crate::error::{ParserError, Span};
use crate::lexer::{Literal, Token, TokenKind};
use crate::reader::{Datum, Group};

#[cfg(test)]
#[path = "expression_test.rs"]
mod test;

/// An AST node: a tagged variant plus the source span merged from the
/// tokens it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Boolean(bool),
    Str(String),
    /// A variable reference; only ever produced outside quotation.
    Identifier(String),
    /// An opaque name; only ever produced inside quotation.
    Symbol(String),
    Nil,
    /// A proper list when `tail` is absent, a dotted one otherwise.
    Pair {
        elements: Vec<Expression>,
        tail: Option<Box<Expression>>,
    },
    Vector(Vec<Expression>),
    /// Expressions evaluated in order for effect, the last for value.
    Sequence(Vec<Expression>),
    Lambda {
        params: Vec<String>,
        rest: Option<String>,
        body: Box<Expression>,
    },
    FunctionDefinition {
        name: String,
        params: Vec<String>,
        rest: Option<String>,
        body: Box<Expression>,
    },
    Definition {
        name: String,
        value: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Assignment {
        name: String,
        value: Box<Expression>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Box<Expression>,
    },
    Cond {
        clauses: Vec<CondClause>,
        else_clause: Option<Box<Expression>>,
    },
    Begin(Vec<Expression>),
    Delay(Box<Expression>),
    Import {
        source: String,
        names: Vec<Expression>,
        js_flavored: bool,
    },
    Export {
        names: Vec<Expression>,
        js_flavored: bool,
    },
    Application {
        operator: Box<Expression>,
        operands: Vec<Expression>,
    },
    /// Wraps an expression whose result a later stage splices into the
    /// enclosing list.
    SpliceMarker(Box<Expression>),
}

impl ExprKind {
    fn describe(&self) -> &'static str {
        match *self {
            ExprKind::Number(..) => "a number",
            ExprKind::Boolean(..) => "a boolean",
            ExprKind::Str(..) => "a string",
            ExprKind::Identifier(..) => "an identifier",
            ExprKind::Symbol(..) => "a symbol",
            ExprKind::Nil => "the empty list",
            ExprKind::Pair { .. } => "a list",
            ExprKind::Vector(..) => "a vector",
            ExprKind::Sequence(..) => "a sequence",
            ExprKind::Lambda { .. } => "a lambda",
            ExprKind::FunctionDefinition { .. } | ExprKind::Definition { .. } => "a definition",
            ExprKind::Conditional { .. } => "a conditional",
            ExprKind::Assignment { .. } => "an assignment",
            ExprKind::Let { .. } => "a let form",
            ExprKind::Cond { .. } => "a cond form",
            ExprKind::Begin(..) => "a begin form",
            ExprKind::Delay(..) => "a delay form",
            ExprKind::Import { .. } => "an import",
            ExprKind::Export { .. } => "an export",
            ExprKind::Application { .. } => "an application",
            ExprKind::SpliceMarker(..) => "a splice marker",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Expression,
}

/// One `cond` clause. An absent body means the test value itself is the
/// result of the clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CondClause {
    pub test: Expression,
    pub body: Option<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteMode {
    None,
    Quote,
    Quasiquote,
}

type Validator<'a> = &'a dyn Fn(&Datum) -> Result<(), ParserError>;

/// The semantic parser. One instance per parse; the only state is the
/// quote mode and the immutable chapter ceiling.
pub struct Parser {
    chapter: u32,
    quote_mode: QuoteMode,
}

impl Parser {
    pub fn new(chapter: u32) -> Parser {
        Parser {
            chapter,
            quote_mode: QuoteMode::None,
        }
    }

    /// Parses every top-level datum independently, in order.
    pub fn parse(&mut self, data: Vec<Datum>) -> Result<Vec<Expression>, ParserError> {
        let mut expressions = Vec::with_capacity(data.len());
        for datum in data {
            self.quote_mode = QuoteMode::None;
            let expression = self.parse_expression(datum)?;
            debug!("top-level {} at {}", expression.kind.describe(), expression.span);
            expressions.push(expression);
        }
        Ok(expressions)
    }

    fn parse_expression(&mut self, datum: Datum) -> Result<Expression, ParserError> {
        match datum {
            Datum::Lexeme(token) => self.parse_token(token),
            Datum::Group(group) => self.parse_group(group),
        }
    }

    fn parse_token(&mut self, token: Token) -> Result<Expression, ParserError> {
        let span = token.span();
        let kind = match token.kind {
            TokenKind::Number => match token.literal {
                Some(Literal::Number(n)) => ExprKind::Number(n),
                _ => {
                    return Err(ParserError::UnexpectedForm {
                        lexeme: token.lexeme,
                        span,
                    })
                }
            },
            TokenKind::Boolean => match token.literal {
                Some(Literal::Boolean(b)) => ExprKind::Boolean(b),
                _ => {
                    return Err(ParserError::UnexpectedForm {
                        lexeme: token.lexeme,
                        span,
                    })
                }
            },
            TokenKind::Str => match token.literal {
                Some(Literal::Str(ref s)) => ExprKind::Str(s.clone()),
                _ => {
                    return Err(ParserError::UnexpectedForm {
                        lexeme: token.lexeme,
                        span,
                    })
                }
            },
            TokenKind::Identifier => {
                if self.quote_mode == QuoteMode::None {
                    ExprKind::Identifier(token.name().to_string())
                } else {
                    ExprKind::Symbol(token.name().to_string())
                }
            }
            // keyword words are opaque names inside quoted data
            kind if self.quote_mode != QuoteMode::None && nameable(kind) => {
                ExprKind::Symbol(token.lexeme.clone())
            }
            _ => {
                return Err(ParserError::UnexpectedForm {
                    lexeme: token.lexeme,
                    span,
                })
            }
        };
        Ok(Expression { kind, span })
    }

    fn parse_group(&mut self, group: Group) -> Result<Expression, ParserError> {
        // affectors control mode transitions regardless of ambient mode
        if !group.is_parenthesized() {
            return self.parse_affector_group(group);
        }

        let span = group.span();
        let elements = group.into_inner();
        if elements.is_empty() {
            return Ok(Expression {
                kind: ExprKind::Nil,
                span,
            });
        }

        match self.quote_mode {
            QuoteMode::None => self.parse_form(elements, span),
            _ => self.parse_quoted_list(elements, span),
        }
    }

    // Inside a quotation a parenthesized group is plain data: forms are
    // no longer special, dotted tails are supported.
    fn parse_quoted_list(
        &mut self,
        elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        let (elements, tail) = self.destructure(elements, None)?;
        Ok(Expression {
            kind: ExprKind::Pair {
                elements,
                tail: tail.map(Box::new),
            },
            span,
        })
    }

    fn parse_form(&mut self, elements: Vec<Datum>, span: Span) -> Result<Expression, ParserError> {
        let head = elements[0].token().map(|t| t.kind);
        if let Some(kind) = head {
            trace!("form dispatch on {:?} at {}", kind, span);
        }

        match head {
            Some(TokenKind::Define) => self.parse_define(elements, span),
            Some(TokenKind::Lambda) => self.parse_lambda(elements, span),
            Some(TokenKind::If) => self.parse_if(elements, span),
            Some(TokenKind::Let) => self.parse_let(elements, span),
            Some(TokenKind::Cond) => self.parse_cond(elements, span),
            Some(TokenKind::Begin) => self.parse_begin(elements, span),
            Some(TokenKind::Delay) => self.parse_delay(elements, span),
            Some(TokenKind::SetBang) => self.parse_assignment(elements, span),
            Some(TokenKind::Import) | Some(TokenKind::ImportJs) => {
                self.parse_import(elements, span)
            }
            Some(TokenKind::Export) | Some(TokenKind::ExportJs) => {
                self.parse_export(elements, span)
            }
            Some(TokenKind::Else) | Some(TokenKind::Dot) | Some(TokenKind::Ellipsis) => {
                let offender = &elements[0];
                Err(ParserError::UnexpectedForm {
                    lexeme: offender.text(),
                    span: offender.span(),
                })
            }
            // anything else heads a generic application
            _ => self.parse_application(elements, span),
        }
    }

    //
    // The affector state machine
    //

    fn parse_affector_group(&mut self, group: Group) -> Result<Expression, ParserError> {
        let span = group.span();
        let mut elements = group.into_inner();

        let target = match elements.pop() {
            Some(datum) => datum,
            None => return Err(ParserError::UnexpectedEof { pos: span.end }),
        };
        let affector = match elements.pop() {
            Some(Datum::Lexeme(token)) => token,
            Some(other) => {
                return Err(ParserError::UnexpectedForm {
                    lexeme: other.text(),
                    span: other.span(),
                })
            }
            None => return Err(ParserError::UnexpectedEof { pos: span.end }),
        };

        self.gate(&affector)?;

        match affector.kind {
            TokenKind::Quote => self.parse_quote(affector, target, span),
            TokenKind::Quasiquote => self.parse_quasiquote(affector, target, span),
            TokenKind::Unquote => self.parse_unquote(affector, target, span),
            TokenKind::UnquoteSplicing => self.parse_unquote_splicing(affector, target, span),
            TokenKind::VectorMarker => self.parse_vector(target, span),
            _ => {
                let span = affector.span();
                Err(ParserError::UnexpectedForm {
                    lexeme: affector.lexeme,
                    span,
                })
            }
        }
    }

    fn parse_quote(
        &mut self,
        affector: Token,
        target: Datum,
        span: Span,
    ) -> Result<Expression, ParserError> {
        if self.quote_mode != QuoteMode::None {
            // quote is itself data once already quoted
            return self.quotation_as_data(keywords::QUOTE, affector, target, span);
        }

        self.quote_mode = QuoteMode::Quote;
        let result = self.parse_expression(target);
        self.quote_mode = QuoteMode::None;
        Ok(respan(result?, span))
    }

    fn parse_quasiquote(
        &mut self,
        affector: Token,
        target: Datum,
        span: Span,
    ) -> Result<Expression, ParserError> {
        if self.quote_mode != QuoteMode::None {
            return self.quotation_as_data(keywords::QUASIQUOTE, affector, target, span);
        }

        self.quote_mode = QuoteMode::Quasiquote;
        let result = self.parse_expression(target);
        self.quote_mode = QuoteMode::None;
        Ok(respan(result?, span))
    }

    fn parse_unquote(
        &mut self,
        affector: Token,
        target: Datum,
        span: Span,
    ) -> Result<Expression, ParserError> {
        match self.quote_mode {
            // unquote means nothing outside a quotation
            QuoteMode::None => {
                let span = affector.span();
                Err(ParserError::UnsupportedToken {
                    lexeme: affector.lexeme,
                    span,
                })
            }
            // unquote cannot escape a pure quote, only annotate it
            QuoteMode::Quote => self.quotation_as_data(keywords::UNQUOTE, affector, target, span),
            QuoteMode::Quasiquote => {
                self.quote_mode = QuoteMode::None;
                let result = self.parse_expression(target);
                self.quote_mode = QuoteMode::Quasiquote;
                Ok(respan(result?, span))
            }
        }
    }

    fn parse_unquote_splicing(
        &mut self,
        affector: Token,
        target: Datum,
        span: Span,
    ) -> Result<Expression, ParserError> {
        match self.quote_mode {
            QuoteMode::None => {
                let span = affector.span();
                Err(ParserError::UnsupportedToken {
                    lexeme: affector.lexeme,
                    span,
                })
            }
            QuoteMode::Quote => {
                // recorded as literal data, wrapped for the later
                // splicing stage
                let list =
                    self.quotation_as_data(keywords::UNQUOTE_SPLICING, affector, target, span)?;
                Ok(Expression {
                    kind: ExprKind::SpliceMarker(Box::new(list)),
                    span,
                })
            }
            // splicing at the outer quasiquote level is deferred
            QuoteMode::Quasiquote => {
                let span = affector.span();
                Err(ParserError::UnsupportedToken {
                    lexeme: affector.lexeme,
                    span,
                })
            }
        }
    }

    // `(<marker> <target>)` as a literal two-element list, with the
    // target parsed under the current (unchanged) mode.
    fn quotation_as_data(
        &mut self,
        marker: &str,
        affector: Token,
        target: Datum,
        span: Span,
    ) -> Result<Expression, ParserError> {
        let marker = Expression {
            kind: ExprKind::Symbol(marker.to_string()),
            span: affector.span(),
        };
        let inner = self.parse_expression(target)?;
        Ok(Expression {
            kind: ExprKind::Pair {
                elements: vec![marker, inner],
                tail: None,
            },
            span,
        })
    }

    // Vector elements are always fully quoted, whatever the ambient
    // mode.
    fn parse_vector(&mut self, target: Datum, span: Span) -> Result<Expression, ParserError> {
        let group = match target {
            Datum::Group(group) if group.is_parenthesized() => group,
            other => {
                return Err(ParserError::UnexpectedForm {
                    lexeme: other.text(),
                    span: other.span(),
                })
            }
        };

        let saved = self.quote_mode;
        self.quote_mode = QuoteMode::Quote;
        let items = group
            .into_inner()
            .into_iter()
            .map(|d| self.parse_expression(d))
            .collect::<Result<Vec<_>, _>>();
        self.quote_mode = saved;

        Ok(Expression {
            kind: ExprKind::Vector(items?),
            span,
        })
    }

    //
    // Special forms
    //

    fn parse_lambda(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        self.expect_shape(
            elements.len() >= 3,
            "(lambda (params...) body...)",
            &elements,
            span,
        )?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;

        let (params, rest) = self.parse_formals(elements.remove(0))?;
        let body = self.parse_body(elements, span)?;

        Ok(Expression {
            kind: ExprKind::Lambda {
                params,
                rest,
                body: Box::new(body),
            },
            span,
        })
    }

    fn parse_define(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        self.expect_shape(
            elements.len() >= 3,
            "(define name value) or (define (name params...) body...)",
            &elements,
            span,
        )?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;

        let signature = elements.remove(0);
        match signature {
            // function shorthand: the second element is a group
            Datum::Group(group) if group.is_parenthesized() => {
                let (mut names, rest) =
                    self.destructure(group.into_inner(), Some(&expect_identifier))?;
                if names.is_empty() {
                    return Err(ParserError::ExpectedForm {
                        expected: "a function name".to_string(),
                        found: "()".to_string(),
                        span,
                    });
                }
                let name = identifier_name(names.remove(0))?;
                let params = names
                    .into_iter()
                    .map(identifier_name)
                    .collect::<Result<_, _>>()?;
                let rest = rest.map(identifier_name).transpose()?;
                let body = self.parse_body(elements, span)?;

                Ok(Expression {
                    kind: ExprKind::FunctionDefinition {
                        name,
                        params,
                        rest,
                        body: Box::new(body),
                    },
                    span,
                })
            }
            Datum::Lexeme(ref token) if token.kind == TokenKind::Identifier => {
                // value form takes exactly one expression
                self.expect_shape(elements.len() == 1, "(define name value)", &elements, span)?;
                let name = token.name().to_string();
                let value = self.parse_expression(elements.remove(0))?;
                Ok(Expression {
                    kind: ExprKind::Definition {
                        name,
                        value: Box::new(value),
                    },
                    span,
                })
            }
            other => Err(ParserError::ExpectedForm {
                expected: "a name or a (name params...) signature".to_string(),
                found: other.text(),
                span: other.span(),
            }),
        }
    }

    fn parse_if(&mut self, mut elements: Vec<Datum>, span: Span) -> Result<Expression, ParserError> {
        self.expect_shape(
            elements.len() == 3 || elements.len() == 4,
            "(if test consequent alternate?)",
            &elements,
            span,
        )?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;

        let test = self.parse_expression(elements.remove(0))?;
        let consequent = self.parse_expression(elements.remove(0))?;
        let alternate = if elements.is_empty() {
            // the alternate defaults to an undefined-value reference
            Expression {
                kind: ExprKind::Identifier(keywords::UNDEFINED.to_string()),
                span,
            }
        } else {
            self.parse_expression(elements.remove(0))?
        };

        Ok(Expression {
            kind: ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        })
    }

    fn parse_let(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        self.expect_shape(
            elements.len() >= 3,
            "(let ((name value)...) body...)",
            &elements,
            span,
        )?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;

        let bindings_datum = elements.remove(0);
        let bindings_group = match bindings_datum {
            Datum::Group(group) if group.is_parenthesized() => group,
            other => {
                return Err(ParserError::ExpectedForm {
                    expected: "a ((name value)...) bindings list".to_string(),
                    found: other.text(),
                    span: other.span(),
                })
            }
        };

        let bindings = bindings_group
            .into_inner()
            .into_iter()
            .map(|d| self.parse_binding(d))
            .collect::<Result<Vec<_>, _>>()?;
        let body = self.parse_body(elements, span)?;

        Ok(Expression {
            kind: ExprKind::Let {
                bindings,
                body: Box::new(body),
            },
            span,
        })
    }

    fn parse_binding(&mut self, datum: Datum) -> Result<Binding, ParserError> {
        let group = match datum {
            Datum::Group(group) if group.is_parenthesized() => group,
            other => {
                return Err(ParserError::ExpectedForm {
                    expected: "a (name value) binding pair".to_string(),
                    found: other.text(),
                    span: other.span(),
                })
            }
        };

        let span = group.span();
        let mut inner = group.into_inner();
        if inner.len() != 2 {
            return Err(ParserError::ExpectedForm {
                expected: "a (name value) binding pair".to_string(),
                found: inner.first().map(|d| d.text()).unwrap_or_default(),
                span,
            });
        }

        if let (Some(value_datum), Some(name_datum)) = (inner.pop(), inner.pop()) {
            expect_identifier(&name_datum)?;
            let name = identifier_name(self.parse_expression(name_datum)?)?;
            let value = self.parse_expression(value_datum)?;
            Ok(Binding { name, value })
        } else {
            Err(ParserError::UnexpectedEof { pos: span.end })
        }
    }

    fn parse_cond(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        self.expect_shape(
            elements.len() >= 2,
            "(cond (test body...)...)",
            &elements,
            span,
        )?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;

        let clause_count = elements.len();
        let mut clauses = Vec::with_capacity(clause_count);
        let mut else_clause = None;

        for (i, datum) in elements.into_iter().enumerate() {
            let is_final = i + 1 == clause_count;

            let group = match datum {
                Datum::Group(group) if group.is_parenthesized() => group,
                other => {
                    return Err(ParserError::ExpectedForm {
                        expected: "a (test body...) cond clause".to_string(),
                        found: other.text(),
                        span: other.span(),
                    })
                }
            };
            let clause_span = group.span();
            let mut inner = group.into_inner();

            if inner.is_empty() || (is_final && inner.len() < 2) {
                return Err(ParserError::ExpectedForm {
                    expected: if is_final {
                        "a final cond clause with a test and a body".to_string()
                    } else {
                        "a cond clause with a test".to_string()
                    },
                    found: inner.first().map(|d| d.text()).unwrap_or_default(),
                    span: clause_span,
                });
            }

            let head_is_else = inner[0]
                .token()
                .map(|t| t.kind == TokenKind::Else)
                .unwrap_or(false);

            if head_is_else {
                // else may only head the final clause
                if !is_final {
                    let offender = &inner[0];
                    return Err(ParserError::UnexpectedForm {
                        lexeme: offender.text(),
                        span: offender.span(),
                    });
                }
                inner.remove(0);
                else_clause = Some(self.parse_body(inner, clause_span)?);
            } else {
                let test = self.parse_expression(inner.remove(0))?;
                let body = if inner.is_empty() {
                    None
                } else {
                    Some(self.parse_body(inner, clause_span)?)
                };
                clauses.push(CondClause { test, body });
            }
        }

        Ok(Expression {
            kind: ExprKind::Cond {
                clauses,
                else_clause: else_clause.map(Box::new),
            },
            span,
        })
    }

    fn parse_begin(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        self.expect_shape(elements.len() >= 2, "(begin body...)", &elements, span)?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;

        let body = elements
            .into_iter()
            .map(|d| self.parse_expression(d))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expression {
            kind: ExprKind::Begin(body),
            span,
        })
    }

    fn parse_delay(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        self.expect_shape(elements.len() == 2, "(delay expression)", &elements, span)?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;

        let delayed = self.parse_expression(elements.remove(0))?;
        Ok(Expression {
            kind: ExprKind::Delay(Box::new(delayed)),
            span,
        })
    }

    fn parse_assignment(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        self.expect_shape(elements.len() == 3, "(set! name value)", &elements, span)?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;

        let name_datum = elements.remove(0);
        expect_identifier(&name_datum)?;
        let name = identifier_name(self.parse_expression(name_datum)?)?;
        let value = self.parse_expression(elements.remove(0))?;

        Ok(Expression {
            kind: ExprKind::Assignment {
                name,
                value: Box::new(value),
            },
            span,
        })
    }

    fn parse_import(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        self.expect_shape(
            elements.len() == 3,
            "(import \"source\" (names...))",
            &elements,
            span,
        )?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;
        let js_flavored = kw.kind == TokenKind::ImportJs;

        let source_datum = elements.remove(0);
        let source = match source_datum.token() {
            Some(token) => match token.literal {
                Some(Literal::Str(ref s)) => s.clone(),
                _ => {
                    return Err(ParserError::ExpectedForm {
                        expected: "a source string".to_string(),
                        found: source_datum.text(),
                        span: source_datum.span(),
                    })
                }
            },
            None => {
                return Err(ParserError::ExpectedForm {
                    expected: "a source string".to_string(),
                    found: source_datum.text(),
                    span: source_datum.span(),
                })
            }
        };

        let names = self.parse_name_list(elements.remove(0))?;
        Ok(Expression {
            kind: ExprKind::Import {
                source,
                names,
                js_flavored,
            },
            span,
        })
    }

    fn parse_export(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        self.expect_shape(elements.len() == 2, "(export (names...))", &elements, span)?;
        let kw = self.head_token(&mut elements)?;
        self.gate(&kw)?;
        let js_flavored = kw.kind == TokenKind::ExportJs;

        let names = self.parse_name_list(elements.remove(0))?;
        Ok(Expression {
            kind: ExprKind::Export { names, js_flavored },
            span,
        })
    }

    fn parse_name_list(&mut self, datum: Datum) -> Result<Vec<Expression>, ParserError> {
        let group = match datum {
            Datum::Group(group) if group.is_parenthesized() => group,
            other => {
                return Err(ParserError::ExpectedForm {
                    expected: "a (names...) list".to_string(),
                    found: other.text(),
                    span: other.span(),
                })
            }
        };

        group
            .into_inner()
            .into_iter()
            .map(|d| {
                expect_identifier(&d)?;
                self.parse_expression(d)
            })
            .collect()
    }

    fn parse_application(
        &mut self,
        mut elements: Vec<Datum>,
        span: Span,
    ) -> Result<Expression, ParserError> {
        let operator = self.parse_expression(elements.remove(0))?;
        let operands = elements
            .into_iter()
            .map(|d| self.parse_expression(d))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Expression {
            kind: ExprKind::Application {
                operator: Box::new(operator),
                operands,
            },
            span,
        })
    }

    //
    // Shared helpers
    //

    /// The one place rest-parameter and improper-list semantics live:
    /// splits an ordered datum list into a parsed fixed prefix and an
    /// optional dotted tail, validating each element when a validator
    /// is supplied.
    fn destructure(
        &mut self,
        mut elements: Vec<Datum>,
        validate: Option<Validator>,
    ) -> Result<(Vec<Expression>, Option<Expression>), ParserError> {
        fn is_dot(datum: &Datum) -> bool {
            datum
                .token()
                .map(|t| t.kind == TokenKind::Dot)
                .unwrap_or(false)
        }

        if elements.is_empty() {
            return Ok((Vec::new(), None));
        }

        let mut tail = None;
        if elements.len() >= 2 && is_dot(&elements[elements.len() - 2]) {
            // a dotted tail needs a non-empty prefix
            if elements.len() == 2 {
                let dot = &elements[0];
                return Err(ParserError::UnexpectedForm {
                    lexeme: dot.text(),
                    span: dot.span(),
                });
            }
            if let (Some(tail_datum), Some(_dot)) = (elements.pop(), elements.pop()) {
                if let Some(check) = validate {
                    check(&tail_datum)?;
                }
                tail = Some(self.parse_expression(tail_datum)?);
            }
        }

        let mut prefix = Vec::with_capacity(elements.len());
        for datum in elements {
            if is_dot(&datum) {
                return Err(ParserError::UnexpectedForm {
                    lexeme: datum.text(),
                    span: datum.span(),
                });
            }
            if let Some(check) = validate {
                check(&datum)?;
            }
            prefix.push(self.parse_expression(datum)?);
        }

        Ok((prefix, tail))
    }

    fn parse_formals(&mut self, datum: Datum) -> Result<(Vec<String>, Option<String>), ParserError> {
        match datum {
            // a bare name takes every argument as the rest list
            Datum::Lexeme(ref token) if token.kind == TokenKind::Identifier => {
                Ok((Vec::new(), Some(token.name().to_string())))
            }
            Datum::Group(group) if group.is_parenthesized() => {
                let (params, rest) =
                    self.destructure(group.into_inner(), Some(&expect_identifier))?;
                let params = params
                    .into_iter()
                    .map(identifier_name)
                    .collect::<Result<_, _>>()?;
                let rest = rest.map(identifier_name).transpose()?;
                Ok((params, rest))
            }
            other => Err(ParserError::ExpectedForm {
                expected: "a parameter list".to_string(),
                found: other.text(),
                span: other.span(),
            }),
        }
    }

    // A body of one expression stays bare; several merge into a
    // sequence whose value is the last one.
    fn parse_body(&mut self, datums: Vec<Datum>, fallback: Span) -> Result<Expression, ParserError> {
        let span = span_of(&datums).unwrap_or(fallback);
        let mut body = datums
            .into_iter()
            .map(|d| self.parse_expression(d))
            .collect::<Result<Vec<_>, _>>()?;

        if body.len() == 1 {
            if let Some(expression) = body.pop() {
                return Ok(expression);
            }
        }
        Ok(Expression {
            kind: ExprKind::Sequence(body),
            span,
        })
    }

    fn head_token(&self, elements: &mut Vec<Datum>) -> Result<Token, ParserError> {
        match elements.remove(0) {
            Datum::Lexeme(token) => Ok(token),
            other => Err(ParserError::UnexpectedForm {
                lexeme: other.text(),
                span: other.span(),
            }),
        }
    }

    fn gate(&self, token: &Token) -> Result<(), ParserError> {
        let required = keywords::required_chapter(token.kind);
        if required > self.chapter {
            return Err(ParserError::DisallowedToken {
                lexeme: token.lexeme.clone(),
                required,
                chapter: self.chapter,
                span: token.span(),
            });
        }
        Ok(())
    }

    fn expect_shape(
        &self,
        ok: bool,
        expected: &str,
        elements: &[Datum],
        span: Span,
    ) -> Result<(), ParserError> {
        if ok {
            return Ok(());
        }
        Err(ParserError::ExpectedForm {
            expected: expected.to_string(),
            found: elements.first().map(|d| d.text()).unwrap_or_default(),
            span,
        })
    }
}

fn respan(expression: Expression, span: Span) -> Expression {
    Expression {
        kind: expression.kind,
        span,
    }
}

fn span_of(datums: &[Datum]) -> Option<Span> {
    let first = datums.first()?.span();
    let last = datums.last().map(Datum::span).unwrap_or(first);
    Some(first.merge(last))
}

fn expect_identifier(datum: &Datum) -> Result<(), ParserError> {
    match datum.token() {
        Some(token) if token.kind == TokenKind::Identifier => Ok(()),
        _ => Err(ParserError::ExpectedForm {
            expected: "an identifier".to_string(),
            found: datum.text(),
            span: datum.span(),
        }),
    }
}

fn identifier_name(expression: Expression) -> Result<String, ParserError> {
    match expression.kind {
        ExprKind::Identifier(name) => Ok(name),
        ref other => Err(ParserError::ExpectedForm {
            expected: "an identifier".to_string(),
            found: other.describe().to_string(),
            span: expression.span,
        }),
    }
}

// Keyword words denote opaque names inside quoted data.
fn nameable(kind: TokenKind) -> bool {
    match kind {
        TokenKind::If
        | TokenKind::Let
        | TokenKind::Cond
        | TokenKind::Else
        | TokenKind::Define
        | TokenKind::Lambda
        | TokenKind::SetBang
        | TokenKind::Begin
        | TokenKind::Delay
        | TokenKind::Import
        | TokenKind::Export
        | TokenKind::ImportJs
        | TokenKind::ExportJs
        | TokenKind::Ellipsis => true,
        _ => false,
    }
}
