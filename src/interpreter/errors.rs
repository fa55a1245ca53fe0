//! Error types
//!
//! Language errors raised by running code are `RuntimeError`s: a kind plus the
//! span of the token that raised them. They travel through the same channel as
//! break/continue/return (see `types::control`). Failures of the engine API
//! itself (bad entry point, corrupt saved state) are ordinary Rust errors.

use super::types::Span;
use std::fmt;
use thiserror::Error;

/* ===================== Runtime errors ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("division by zero")]
    DivisionByZero,
    #[error("variable '{0}' is not initialized")]
    NotInitialized(String),
    #[error("user error {0}")]
    UserError(i32),
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("null pointer")]
    NullPointer,
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: i32, len: usize },
    #[error("stack overflow")]
    StackOverflow,
    #[error("deleted pointer")]
    DeletedPointer,
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("undefined member '{0}'")]
    UndefinedItem(String),
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("'{name}' expects {expected} arguments, got {found}")]
    BadArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("break or continue outside of a loop")]
    NoLoop,
}

impl ErrorKind {
    /// Stable numeric code reported to the host and bound by `catch`
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::DivisionByZero => 6000,
            ErrorKind::NotInitialized(_) => 6001,
            ErrorKind::UserError(code) => *code,
            ErrorKind::UndefinedFunction(_) => 6005,
            ErrorKind::NullPointer => 6007,
            ErrorKind::OutOfBounds { .. } => 6009,
            ErrorKind::StackOverflow => 6010,
            ErrorKind::DeletedPointer => 6011,
            ErrorKind::UndefinedVariable(_) => 6020,
            ErrorKind::UndefinedItem(_) => 6021,
            ErrorKind::TypeMismatch { .. } => 6022,
            ErrorKind::BadArgumentCount { .. } => 6023,
            ErrorKind::NoLoop => 6024,
        }
    }

    /// Engine faults abort the run; `try` never intercepts them
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::StackOverflow)
    }

    pub fn at(self, span: Span) -> RuntimeError {
        RuntimeError { kind: self, span }
    }
}

/// A language error with the span of the token that raised it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub span: Span,
}

impl RuntimeError {
    pub fn code(&self) -> i32 {
        self.kind.code()
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (code {}) at {}..{}",
            self.kind,
            self.code(),
            self.span.start,
            self.span.end
        )
    }
}

/* ===================== Engine errors ===================== */

/// Misuse of the driver API
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no function named '{0}'")]
    UnknownEntry(String),
    #[error("execution is already running '{running}', cannot start '{requested}'")]
    EntryMismatch { running: String, requested: String },
    #[error("no class named '{0}'")]
    UnknownClass(String),
    #[error("no run in progress")]
    NotRunning,
}

/// Failure while saving or restoring execution state
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("corrupt saved state: {0}")]
    Corrupt(String),
    #[error("saved state belongs to a different program")]
    ProgramMismatch,
    #[error("value nested too deeply to save")]
    TooDeep,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        PersistError::Corrupt(msg.into())
    }
}
