use super::*;
use crate::error::Position;

fn kinds(code: &str) -> Vec<TokenKind> {
    scan(code)
        .expect("valid input")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

fn assert_next(code: &str, kind: TokenKind) {
    let tokens = scan(code).expect("valid input");
    assert_eq!(tokens[0].kind, kind, "scanning {:?}", code);
}

fn assert_number(code: &str, value: f64) {
    let tokens = scan(code).expect("valid input");
    assert_eq!(tokens[0].kind, TokenKind::Number);
    assert_eq!(tokens[0].literal, Some(Literal::Number(value)));
}

fn assert_identifier(code: &str, name: &str) {
    let tokens = scan(code).expect("valid input");
    assert_eq!(tokens[0].kind, TokenKind::Identifier, "scanning {:?}", code);
    assert_eq!(tokens[0].name(), name);
}

#[test]
fn delimiters() {
    assert_eq!(
        kinds("()[]"),
        vec![
            TokenKind::LeftParen,
            TokenKind::RightParen,
            TokenKind::LeftBracket,
            TokenKind::RightBracket,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn quote_family() {
    assert_next("'x", TokenKind::Quote);
    assert_next("`x", TokenKind::Quasiquote);
    assert_next(",x", TokenKind::Unquote);
    assert_next(",@x", TokenKind::UnquoteSplicing);
}

#[test]
fn quote_family_words() {
    assert_next("quote", TokenKind::Quote);
    assert_next("quasiquote", TokenKind::Quasiquote);
    assert_next("unquote", TokenKind::Unquote);
    assert_next("unquote-splicing", TokenKind::UnquoteSplicing);
}

#[test]
fn booleans() {
    let tokens = scan("#t #f").expect("valid input");
    assert_eq!(tokens[0].literal, Some(Literal::Boolean(true)));
    assert_eq!(tokens[1].literal, Some(Literal::Boolean(false)));
}

#[test]
fn vector_marker() {
    assert_eq!(
        kinds("#(1)"),
        vec![
            TokenKind::VectorMarker,
            TokenKind::LeftParen,
            TokenKind::Number,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn datum_comment_marker() {
    assert_eq!(
        kinds("#;1 2"),
        vec![
            TokenKind::DatumComment,
            TokenKind::Number,
            TokenKind::Number,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn numbers() {
    assert_number("42", 42.0);
    assert_number("-3", -3.0);
    assert_number("3.14", 3.14);
    assert_number("1.", 1.0);
    assert_number(".5", 0.5);
    assert_number("-.5", -0.5);
}

#[test]
fn not_numbers() {
    assert_next(".", TokenKind::Dot);
    assert_next("...", TokenKind::Ellipsis);
    assert_identifier("-", "-");
    assert_identifier("-.", "-.");
    assert_identifier("1.2.3", "1.2.3");
    assert_identifier("1+", "1+");
}

#[test]
fn keywords() {
    assert_next("if", TokenKind::If);
    assert_next("let", TokenKind::Let);
    assert_next("cond", TokenKind::Cond);
    assert_next("else", TokenKind::Else);
    assert_next("define", TokenKind::Define);
    assert_next("lambda", TokenKind::Lambda);
    assert_next("set!", TokenKind::SetBang);
    assert_next("begin", TokenKind::Begin);
    assert_next("delay", TokenKind::Delay);
    assert_next("import", TokenKind::Import);
    assert_next("export", TokenKind::Export);
    assert_next("import-js", TokenKind::ImportJs);
    assert_next("export-js", TokenKind::ExportJs);
}

#[test]
fn almost_keywords_are_identifiers() {
    assert_identifier("iff", "iff");
    assert_identifier("define-syntax", "define-syntax");
    assert_identifier("set", "set");
}

#[test]
fn identifiers() {
    assert_identifier("square", "square");
    assert_identifier("list->vector", "list->vector");
    assert_identifier("+", "+");
    assert_identifier("a1", "a1");
    assert_identifier("even?", "even?");
}

#[test]
fn strings() {
    let tokens = scan("\"foo bar\"").expect("valid input");
    assert_eq!(tokens[0].kind, TokenKind::Str);
    assert_eq!(tokens[0].literal, Some(Literal::Str("foo bar".to_string())));
    assert_eq!(tokens[0].lexeme, "\"foo bar\"");

    let tokens = scan("\"a\\\"b\\n\"").expect("valid input");
    assert_eq!(tokens[0].literal, Some(Literal::Str("a\"b\n".to_string())));
}

#[test]
fn unterminated_string() {
    assert_eq!(
        scan("\"abc"),
        Err(ParserError::UnterminatedToken {
            what: "string",
            start: Position::new(1, 1),
        })
    );
}

#[test]
fn verbatim_symbols() {
    let tokens = scan("|two words|").expect("valid input");
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[0].name(), "two words");

    // newlines inside the pipes update the position tracking
    let tokens = scan("|a\nb| x").expect("valid input");
    assert_eq!(tokens[0].name(), "a\nb");
    assert_eq!(tokens[1].start, Position::new(2, 4));
}

#[test]
fn unterminated_verbatim_symbol() {
    assert_eq!(
        scan("|abc"),
        Err(ParserError::UnterminatedToken {
            what: "verbatim symbol",
            start: Position::new(1, 1),
        })
    );
}

#[test]
fn line_comments() {
    assert_eq!(
        kinds("; a comment\n42"),
        vec![TokenKind::Number, TokenKind::Eof]
    );
}

#[test]
fn block_comments() {
    assert_eq!(kinds("#| skip |# 42"), vec![TokenKind::Number, TokenKind::Eof]);

    let tokens = scan("#| one\ntwo |# x").expect("valid input");
    assert_eq!(tokens[0].start, Position::new(2, 8));
}

#[test]
fn unterminated_block_comment() {
    assert_eq!(
        scan("#| abc"),
        Err(ParserError::UnterminatedToken {
            what: "block comment",
            start: Position::new(1, 1),
        })
    );
}

#[test]
fn unexpected_character() {
    assert_eq!(
        scan("(\\)"),
        Err(ParserError::UnexpectedCharacter {
            c: '\\',
            pos: Position::new(1, 2),
        })
    );
}

#[test]
fn spans() {
    let tokens = scan("(define x\n  12)").expect("valid input");

    assert_eq!(tokens[0].start, Position::new(1, 1));
    assert_eq!(tokens[0].end, Position::new(1, 2));

    assert_eq!(tokens[1].lexeme, "define");
    assert_eq!(tokens[1].start, Position::new(1, 2));
    assert_eq!(tokens[1].end, Position::new(1, 8));

    assert_eq!(tokens[3].lexeme, "12");
    assert_eq!(tokens[3].start, Position::new(2, 3));
    assert_eq!(tokens[3].end, Position::new(2, 5));

    let eof = tokens.last().expect("eof token");
    assert_eq!(eof.kind, TokenKind::Eof);
    assert_eq!(eof.start, Position::new(2, 6));
    assert_eq!(eof.start, eof.end);
}

#[test]
fn eof_terminates_empty_input() {
    assert_eq!(kinds(""), vec![TokenKind::Eof]);
    assert_eq!(kinds("  ;only a comment"), vec![TokenKind::Eof]);
}
