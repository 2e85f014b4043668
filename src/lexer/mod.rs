mod chars;
mod token;

pub use self::token::{keyword, scan, Literal, Token, TokenKind};
