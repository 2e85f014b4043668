use crate::lexer::TokenKind;

pub const QUOTE: &str = "quote";
pub const QUASIQUOTE: &str = "quasiquote";
pub const UNQUOTE: &str = "unquote";
pub const UNQUOTE_SPLICING: &str = "unquote-splicing";

/// The identifier a conditional falls back to when no alternate is
/// written.
pub const UNDEFINED: &str = "undefined";

pub const BASE_CHAPTER: u32 = 1;
pub const QUOTING_CHAPTER: u32 = 2;
pub const MUTATION_CHAPTER: u32 = 3;

/// The chapter-rank table: the minimum chapter at which a construct is
/// accepted. Constructs above the configured ceiling are rejected with
/// a disallowed-token error. The pair dot carries no rank of its own:
/// it only occurs inside quoted data, which the quote affector already
/// gates.
pub fn required_chapter(kind: TokenKind) -> u32 {
    match kind {
        TokenKind::Quote
        | TokenKind::Quasiquote
        | TokenKind::Unquote
        | TokenKind::UnquoteSplicing
        | TokenKind::VectorMarker => QUOTING_CHAPTER,
        TokenKind::SetBang | TokenKind::Delay => MUTATION_CHAPTER,
        _ => BASE_CHAPTER,
    }
}
