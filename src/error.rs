//! Fatal diagnostics. Every compile error is terminal: there is no
//! recovery, one error is printed and the process exits non-zero.

use std::fmt;
use thiserror::Error;

/// 1-based source location, rendered as `Line[L] Col[C]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

impl Location {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line[{}] Col[{}]", self.line, self.col)
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{loc}: {msg}")]
    Syntax { loc: Location, msg: String },

    #[error("{loc}: {msg}")]
    Semantic { loc: Location, msg: String },

    #[error("{0}")]
    Backend(String),

    #[error("{0}")]
    InvalidArgs(String),
}

impl CompileError {
    pub fn syntax(loc: Location, msg: impl Into<String>) -> Self {
        CompileError::Syntax { loc, msg: msg.into() }
    }

    pub fn semantic(loc: Location, msg: impl Into<String>) -> Self {
        CompileError::Semantic { loc, msg: msg.into() }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        CompileError::Backend(msg.into())
    }

    pub fn invalid_args(msg: impl Into<String>) -> Self {
        CompileError::InvalidArgs(msg.into())
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
