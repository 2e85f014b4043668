//! Tokenizer for the staged Scheme dialect.
//!
//! A single left-to-right pass over the character cursor. Tokens which
//! require implicit termination (identifiers, numbers, dot) end at the
//! first non-symbolic character; everything starting with a digit, `-`
//! or `.` is provisionally a number and falls back to the keyword table
//! when it does not decode.

use log::{debug, trace};

use super::chars::Chars;
use crate::error::{ParserError, Position, Span};

#[cfg(test)]
#[path = "token_test.rs"]
mod token_test;

/// A source token with its exact span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub start: Position,
    pub end: Position,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        lexeme: String,
        literal: Option<Literal>,
        start: Position,
        end: Position,
    ) -> Token {
        Token {
            kind,
            lexeme,
            literal,
            start,
            end,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// The identifier name this token denotes: the lexeme, with the
    /// delimiters of a `|...|` verbatim symbol stripped.
    pub fn name(&self) -> &str {
        let lexeme = &self.lexeme[..];
        if lexeme.len() >= 2 && lexeme.starts_with('|') && lexeme.ends_with('|') {
            &lexeme[1..lexeme.len() - 1]
        } else {
            lexeme
        }
    }

    /// True when `self` is the close delimiter matching `open`.
    pub fn closes(&self, open: &Token) -> bool {
        match (open.kind, self.kind) {
            (TokenKind::LeftParen, TokenKind::RightParen)
            | (TokenKind::LeftBracket, TokenKind::RightBracket) => true,
            _ => false,
        }
    }
}

/// The closed set of token kinds.
///
/// The quote family is produced both for the punctuation forms (`'`,
/// `` ` ``, `,`, `,@`) and for the spelled-out keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    Ellipsis,
    DatumComment,

    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
    VectorMarker,

    Identifier,
    Number,
    Boolean,
    Str,

    If,
    Let,
    Cond,
    Else,
    Define,
    Lambda,
    SetBang,
    Begin,
    Delay,
    Import,
    Export,
    ImportJs,
    ExportJs,

    Eof,
}

impl TokenKind {
    pub fn is_open_delimiter(self) -> bool {
        match self {
            TokenKind::LeftParen | TokenKind::LeftBracket => true,
            _ => false,
        }
    }

    pub fn is_close_delimiter(self) -> bool {
        match self {
            TokenKind::RightParen | TokenKind::RightBracket => true,
            _ => false,
        }
    }

    /// Affectors are the prefix markers that claim exactly the next
    /// datum during grouping.
    pub fn is_affector(self) -> bool {
        match self {
            TokenKind::Quote
            | TokenKind::Quasiquote
            | TokenKind::Unquote
            | TokenKind::UnquoteSplicing
            | TokenKind::VectorMarker => true,
            _ => false,
        }
    }
}

/// Decoded literal payload for number, boolean and string tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Boolean(bool),
    Str(String),
}

/// The fixed keyword table. Exact lexemes only; anything else that is
/// lexically valid becomes a generic identifier.
pub fn keyword(lexeme: &str) -> Option<TokenKind> {
    use self::TokenKind::*;

    let kind = match lexeme {
        "." => Dot,
        "..." => Ellipsis,
        "quote" => Quote,
        "quasiquote" => Quasiquote,
        "unquote" => Unquote,
        "unquote-splicing" => UnquoteSplicing,
        "if" => If,
        "let" => Let,
        "cond" => Cond,
        "else" => Else,
        "define" => Define,
        "lambda" => Lambda,
        "set!" => SetBang,
        "begin" => Begin,
        "delay" => Delay,
        "import" => Import,
        "export" => Export,
        "import-js" => ImportJs,
        "export-js" => ExportJs,
        _ => return None,
    };
    Some(kind)
}

/// Tokenizes the whole source, appending a final `Eof` token whose span
/// is the final position.
pub fn scan(source: &str) -> Result<Vec<Token>, ParserError> {
    let mut stream = Chars::new(source);
    let mut tokens = Vec::new();

    while let Some(token) = next_token(&mut stream)? {
        trace!("token {:?} `{}` at {}", token.kind, token.lexeme, token.start);
        tokens.push(token);
    }

    let end = stream.pos();
    tokens.push(Token::new(TokenKind::Eof, String::new(), None, end, end));
    debug!("scanned {} tokens", tokens.len());
    Ok(tokens)
}

fn next_token(stream: &mut Chars) -> Result<Option<Token>, ParserError> {
    loop {
        let c = match stream.peek(0) {
            Some(c) => c,
            None => return Ok(None),
        };

        if c.is_whitespace() {
            stream.next();
            continue;
        }

        match c {
            '(' => return punctuation(stream, TokenKind::LeftParen, 1),
            ')' => return punctuation(stream, TokenKind::RightParen, 1),
            '[' => return punctuation(stream, TokenKind::LeftBracket, 1),
            ']' => return punctuation(stream, TokenKind::RightBracket, 1),
            '\'' => return punctuation(stream, TokenKind::Quote, 1),
            '`' => return punctuation(stream, TokenKind::Quasiquote, 1),
            ',' => {
                return if stream.peek(1) == Some('@') {
                    punctuation(stream, TokenKind::UnquoteSplicing, 2)
                } else {
                    punctuation(stream, TokenKind::Unquote, 1)
                };
            }
            ';' => {
                for d in &mut *stream {
                    if d == '\n' {
                        break;
                    }
                }
                continue;
            }
            '"' => return scan_string(stream).map(Some),
            '|' => return scan_verbatim_symbol(stream).map(Some),
            '#' => match (stream.peek(1), stream.peek(2)) {
                (Some('t'), p) if is_delimiter(p) => return boolean(stream, true),
                (Some('f'), p) if is_delimiter(p) => return boolean(stream, false),
                (Some(';'), _) => return punctuation(stream, TokenKind::DatumComment, 2),
                (Some('|'), _) => {
                    skip_block_comment(stream)?;
                    continue;
                }
                _ => return punctuation(stream, TokenKind::VectorMarker, 1),
            },
            d if is_symbolic(d) => return scan_symbol(stream).map(Some),
            d => {
                return Err(ParserError::UnexpectedCharacter {
                    c: d,
                    pos: stream.pos(),
                });
            }
        }
    }
}

fn punctuation(
    stream: &mut Chars,
    kind: TokenKind,
    length: usize,
) -> Result<Option<Token>, ParserError> {
    let start = stream.pos();
    let mut lexeme = String::new();
    for _ in 0..length {
        if let Some(c) = stream.next() {
            lexeme.push(c);
        }
    }
    Ok(Some(Token::new(kind, lexeme, None, start, stream.pos())))
}

fn boolean(stream: &mut Chars, value: bool) -> Result<Option<Token>, ParserError> {
    let start = stream.pos();
    let mut lexeme = String::new();
    for _ in 0..2 {
        if let Some(c) = stream.next() {
            lexeme.push(c);
        }
    }
    Ok(Some(Token::new(
        TokenKind::Boolean,
        lexeme,
        Some(Literal::Boolean(value)),
        start,
        stream.pos(),
    )))
}

fn scan_string(stream: &mut Chars) -> Result<Token, ParserError> {
    let start = stream.pos();
    let mut lexeme = String::new();
    let mut decoded = String::new();

    if let Some(open) = stream.next() {
        lexeme.push(open);
    }

    loop {
        match stream.next() {
            None => {
                return Err(ParserError::UnterminatedToken {
                    what: "string",
                    start,
                })
            }
            Some('"') => {
                lexeme.push('"');
                break;
            }
            Some('\\') => {
                lexeme.push('\\');
                match stream.next() {
                    None => {
                        return Err(ParserError::UnterminatedToken {
                            what: "string",
                            start,
                        })
                    }
                    Some(e) => {
                        lexeme.push(e);
                        decoded.push(match e {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                    }
                }
            }
            Some(c) => {
                lexeme.push(c);
                decoded.push(c);
            }
        }
    }

    Ok(Token::new(
        TokenKind::Str,
        lexeme,
        Some(Literal::Str(decoded)),
        start,
        stream.pos(),
    ))
}

// `|...|` reads verbatim until the closing pipe, across line breaks.
fn scan_verbatim_symbol(stream: &mut Chars) -> Result<Token, ParserError> {
    let start = stream.pos();
    let mut lexeme = String::new();

    if let Some(open) = stream.next() {
        lexeme.push(open);
    }

    loop {
        match stream.next() {
            None => {
                return Err(ParserError::UnterminatedToken {
                    what: "verbatim symbol",
                    start,
                })
            }
            Some('|') => {
                lexeme.push('|');
                break;
            }
            Some(c) => lexeme.push(c),
        }
    }

    Ok(Token::new(
        TokenKind::Identifier,
        lexeme,
        None,
        start,
        stream.pos(),
    ))
}

fn skip_block_comment(stream: &mut Chars) -> Result<(), ParserError> {
    let start = stream.pos();
    stream.advance(2);

    loop {
        match stream.next() {
            None => {
                return Err(ParserError::UnterminatedToken {
                    what: "block comment",
                    start,
                })
            }
            Some('|') if stream.peek(0) == Some('#') => {
                stream.next();
                return Ok(());
            }
            Some(_) => {}
        }
    }
}

fn scan_symbol(stream: &mut Chars) -> Result<Token, ParserError> {
    let start = stream.pos();
    let mut lexeme = String::new();

    while let Some(c) = stream.peek(0) {
        if !is_symbolic(c) {
            break;
        }
        stream.next();
        lexeme.push(c);
    }
    let end = stream.pos();

    if let Some(value) = number_literal(&lexeme) {
        return Ok(Token::new(
            TokenKind::Number,
            lexeme,
            Some(Literal::Number(value)),
            start,
            end,
        ));
    }

    let kind = keyword(&lexeme).unwrap_or(TokenKind::Identifier);
    Ok(Token::new(kind, lexeme, None, start, end))
}

/// A lexeme qualifies as a number when it opens with a digit, `-` or
/// `.`, contains only digits and dots afterwards, and decodes. The
/// lexemes `.`, `-` and `-.` are never numbers (`.` is the pair dot).
fn number_literal(lexeme: &str) -> Option<f64> {
    match lexeme {
        "." | "-" | "-." => return None,
        _ => {}
    }

    let mut chars = lexeme.chars();
    let first = chars.next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '.') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    lexeme.parse().ok()
}

fn is_delimiter(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(d) => d.is_whitespace() || !is_symbolic(d),
    }
}

// Symbol-valid characters: alphanumerics plus the extended set. The
// reserved delimiters and anything else (control characters, stray
// punctuation) terminate or reject a token.
fn is_symbolic(c: char) -> bool {
    c.is_alphanumeric()
        || match c {
            '!' | '$' | '%' | '&' | '*' | '+' | '-' | '.' | '/' | ':' | '<' | '=' | '>' | '?'
            | '@' | '^' | '_' | '~' | '#' => true,
            _ => false,
        }
}
