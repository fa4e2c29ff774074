//! Runtime error types for the interpreter
//!
//! [`RuntimeError`] covers everything that can go wrong while executing a
//! program (as opposed to lexing, parsing or canonicalizing it). All runtime
//! errors are fatal: they halt execution.

use crate::parser::ast::SourceLocation;
use thiserror::Error;

/// Runtime errors that can occur during execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Read of a variable that was declared but never assigned
    #[error("Read from uninitialized variable '{var}' at line {}", .location.line)]
    UninitializedRead {
        var: String,
        location: SourceLocation,
    },

    #[error("Undefined function '{name}' at line {}", .location.line)]
    UndefinedFunction {
        name: String,
        location: SourceLocation,
    },

    #[error("Undefined variable '{name}' at line {}", .location.line)]
    UndefinedVariable {
        name: String,
        location: SourceLocation,
    },

    #[error("Type error at line {}: expected {expected}, got {got}", .location.line)]
    TypeError {
        expected: String,
        got: String,
        location: SourceLocation,
    },

    #[error("Invalid printf format at line {}: {message}", .location.line)]
    InvalidPrintfFormat {
        message: String,
        location: SourceLocation,
    },

    #[error("No main() function found")]
    NoMainFunction,

    /// Division or modulo by zero
    #[error("{operation} at line {}", .location.line)]
    DivisionError {
        operation: String,
        location: SourceLocation,
    },

    #[error(
        "Function '{function}' expects {expected} argument{}, got {got} at line {}",
        plural(.expected),
        .location.line
    )]
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        got: usize,
        location: SourceLocation,
    },

    #[error("Unsupported operation: {message} at line {}", .location.line)]
    UnsupportedOperation {
        message: String,
        location: SourceLocation,
    },

    /// The step budget ran out (most likely an endless loop)
    #[error("Execution exceeded the limit of {limit} steps")]
    StepLimitExceeded { limit: u64 },

    #[error("Call depth exceeded {limit} at line {}", .location.line)]
    CallDepthExceeded {
        limit: usize,
        location: SourceLocation,
    },
}

fn plural(count: &usize) -> &'static str {
    if *count == 1 {
        ""
    } else {
        "s"
    }
}

impl RuntimeError {
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            RuntimeError::UninitializedRead { location, .. }
            | RuntimeError::UndefinedFunction { location, .. }
            | RuntimeError::UndefinedVariable { location, .. }
            | RuntimeError::TypeError { location, .. }
            | RuntimeError::InvalidPrintfFormat { location, .. }
            | RuntimeError::DivisionError { location, .. }
            | RuntimeError::ArgumentCountMismatch { location, .. }
            | RuntimeError::UnsupportedOperation { location, .. }
            | RuntimeError::CallDepthExceeded { location, .. } => Some(location),
            RuntimeError::NoMainFunction | RuntimeError::StepLimitExceeded { .. } => None,
        }
    }
}
