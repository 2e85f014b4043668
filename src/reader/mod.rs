mod datum;

pub use self::datum::{Datum, Group, Grouper};
