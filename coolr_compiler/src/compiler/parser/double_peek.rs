use crate::compiler::common::{error::*, token::Token};
use std::collections::VecDeque;

/// Token queue with two tokens of lookahead. The second token decides
/// whether an object identifier starts an assignment, a self-dispatch
/// shorthand or is just a plain identifier.
pub struct DoublePeek {
    inner: VecDeque<Token>,
    eof: Option<Token>,
}

impl DoublePeek {
    pub fn new(list: Vec<Token>) -> Self {
        DoublePeek {
            eof: list.last().cloned(),
            inner: list.into(),
        }
    }

    pub fn next(&mut self) -> Option<Token> {
        self.inner.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn peek(&self) -> Result<&Token, Error> {
        self.inner.front().ok_or_else(|| self.eof_error())
    }

    pub fn double_peek(&self) -> Result<&Token, Error> {
        self.inner.get(1).ok_or_else(|| self.eof_error())
    }

    fn eof_error(&self) -> Error {
        let line = self.eof.as_ref().map(|token| token.line).unwrap_or(1);
        Error::new(line, ErrorKind::SyntaxEof)
    }
}
