//! End-to-end runs of the full scan/group/parse pipeline.

use scheme_front::{parse, parse_unbounded, ExprKind, ParserError, QUOTING_CHAPTER};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn whole_program() {
    init();
    let source = r#"
        ; squares, the long way
        (define (square x) (* x x))
        (define total 0)
        (if (< total 10)
            (square total)
            total)
    "#;
    let ast = parse(source, QUOTING_CHAPTER).expect("parseable");
    assert_eq!(ast.len(), 3);
    assert!(matches!(ast[0].kind, ExprKind::FunctionDefinition { .. }));
    assert!(matches!(ast[1].kind, ExprKind::Definition { .. }));
    assert!(matches!(ast[2].kind, ExprKind::Conditional { .. }));
}

#[test]
fn module_roundtrip() {
    init();
    let source = r#"
        (import "rune" (draw-line blank))
        (define (cross rune) (draw-line rune))
        (export (cross))
    "#;
    let ast = parse_unbounded(source).expect("parseable");
    assert!(matches!(ast[0].kind, ExprKind::Import { .. }));
    assert!(matches!(ast[2].kind, ExprKind::Export { .. }));
}

#[test]
fn error_report_names_the_line() {
    init();
    let source = "(define x\n  (foo \"bar))";
    let error = parse_unbounded(source).expect_err("unterminated string");
    assert!(matches!(error, ParserError::UnterminatedToken { .. }));
    let report = error.report(source);
    assert!(report.contains("unterminated string"));
    assert!(report.contains("(foo \"bar))"));
}

#[test]
fn fail_fast_on_first_error() {
    init();
    // the stray close delimiter is reported before the later quote
    let source = ") 'x";
    match parse(source, QUOTING_CHAPTER) {
        Err(ParserError::UnexpectedForm { lexeme, .. }) => assert_eq!(lexeme, ")"),
        other => panic!("expected UnexpectedForm, got {:?}", other),
    }
}
