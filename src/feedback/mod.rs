//! Structured Feedback Module
//!
//! Machine-readable output for tools driving the lowering pass:
//! - JSON error reports with fix suggestions
//! - Lowering statistics

use serde::{Deserialize, Serialize};

use crate::middle::LoweringStats;
use crate::utils::Error;

// ==================== Structured Error Report ====================

/// A structured error report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code (e.g., "E0001")
    pub code: String,

    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    pub location: Location,

    /// Suggested fixes
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Description of the fix
    pub message: String,

    /// The replacement text
    pub replacement: Option<String>,
}

impl ErrorReport {
    /// Create an error report from a lowering error
    pub fn from_error(error: &Error, file_name: &str) -> Self {
        let (code, suggestions) = match error {
            Error::Parse { .. } => (
                "E0001",
                vec![Suggestion {
                    message: "Check for a missing `;` or an unbalanced brace or parenthesis".to_string(),
                    replacement: None,
                }],
            ),
            Error::AwaitOutsideAsync { .. } => (
                "E0002",
                vec![
                    Suggestion {
                        message: "Mark the enclosing function or lambda `async`".to_string(),
                        replacement: Some("async ".to_string()),
                    },
                    Suggestion {
                        message: "Move the `await` into an async function and call that instead".to_string(),
                        replacement: None,
                    },
                ],
            ),
        };

        Self {
            code: code.to_string(),
            severity: Severity::Error,
            message: error.to_string(),
            location: Location {
                file: file_name.to_string(),
                line: error.line(),
                column: error.column(),
            },
            suggestions,
        }
    }
}

// ==================== Lowering Feedback ====================

/// Outcome of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoweringFeedback {
    pub success: bool,

    pub source_file: String,

    /// All errors
    pub diagnostics: Vec<ErrorReport>,

    /// Present when the lowering pass ran to completion
    pub stats: Option<LoweringStats>,
}

impl LoweringFeedback {
    pub fn success(source_file: String, stats: Option<LoweringStats>) -> Self {
        Self {
            success: true,
            source_file,
            diagnostics: vec![],
            stats,
        }
    }

    pub fn failure(source_file: String, error: &Error) -> Self {
        let report = ErrorReport::from_error(error, &source_file);
        Self {
            success: false,
            source_file,
            diagnostics: vec![report],
            stats: None,
        }
    }

    /// Output as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
