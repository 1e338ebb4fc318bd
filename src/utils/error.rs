//! Error handling for the lowering pipeline

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Exit status for a malformed token sequence
pub const EXIT_PARSE: i32 = 1;
/// Exit status for an `await` outside of an async entity
pub const EXIT_PLACEMENT: i32 = 2;

/// Lowering error. Every variant is terminal for the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Parser Errors ====================

    #[error("{message}")]
    Parse { message: String, span: Span },

    // ==================== Placement Errors ====================

    #[error("`await` used outside of an async function or lambda (inside {context})")]
    AwaitOutsideAsync { context: String, span: Span },
}

impl Error {
    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self::Parse { message: message.into(), span }
    }

    pub fn unexpected(expected: impl std::fmt::Display, got: impl std::fmt::Display, span: Span) -> Self {
        Self::Parse {
            message: format!("expected {}, found {}", expected, got),
            span,
        }
    }

    /// Get the span associated with this error
    pub fn span(&self) -> Span {
        match self {
            Self::Parse { span, .. } => *span,
            Self::AwaitOutsideAsync { span, .. } => *span,
        }
    }

    pub fn line(&self) -> usize {
        self.span().line
    }

    pub fn column(&self) -> usize {
        self.span().column
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Parse { .. } => EXIT_PARSE,
            Self::AwaitOutsideAsync { .. } => EXIT_PLACEMENT,
        }
    }

    /// Render as `<line>:<column>: <message>`
    pub fn diagnostic(&self) -> String {
        format!("{}:{}: {}", self.line(), self.column(), self)
    }
}
