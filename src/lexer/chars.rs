use crate::error::Position;

/// A character cursor over the source text with arbitrary lookahead and
/// incremental line/column tracking.
#[derive(Debug)]
pub struct Chars {
    vec: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
}

impl Iterator for Chars {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

impl Chars {
    pub fn new(source: &str) -> Chars {
        Chars {
            vec: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn peek(&self, i: usize) -> Option<char> {
        self.vec.get(self.index + i).cloned()
    }

    /// Position of the next character to be read.
    pub fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }

    pub fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.next();
        }
    }
}
