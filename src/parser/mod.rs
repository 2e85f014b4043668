mod expression;
mod keywords;

pub use self::expression::{Binding, CondClause, ExprKind, Expression, Parser};
pub use self::keywords::{BASE_CHAPTER, MUTATION_CHAPTER, QUOTING_CHAPTER};
