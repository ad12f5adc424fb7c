//! Hard failures raised by the interpreter.
//!
//! Anything in here aborts the whole evaluation.  Inapplicable nodes
//! (calling a non-callable, indexing into `null`, …) are *not* errors; they
//! travel as [`Eval::Failed`](super::walker::Eval) and end up as `undefined`.

use std::fmt;

use thiserror::Error;

/// A syntax error reported by the parser.
///
/// `line` is 1-based, `column` is a 0-based character offset into that line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseError {}

/// Errors that abort an evaluation.
///
/// The binding messages are matched verbatim by callers, so their wording
/// is fixed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Variable {0} is already declared")]
    DuplicateBinding(String),

    #[error("Cannot assign to constant variable {0}")]
    ConstAssignment(String),

    #[error("Variable {0} is not defined")]
    UnboundAssignment(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Maximum call depth of {0} exceeded")]
    CallDepth(usize),

    /// A host-supplied native function reported a failure.
    #[error("{name}: {message}")]
    Native { name: String, message: String },
}

impl EvalError {
    pub fn native(name: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Native {
            name: name.into(),
            message: message.into(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
