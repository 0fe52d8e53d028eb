//! Error handling for Vexel.

use thiserror::Error;

/// Main error type for Vexel operations.
///
/// Errors split into two families: user errors describe expected domain
/// failures (a value that does not fit the target type, a string that does
/// not parse, a function that is not registered) and are recoverable per
/// row; everything else is a system error and aborts the current batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VexelError {
    #[error("Scalar function name not registered: {name}, called with arguments: ({arg_types}).{signatures}")]
    FunctionNotRegistered {
        name: String,
        arg_types: String,
        /// Newline-prefixed list of known signatures, empty when none exist.
        signatures: String,
    },

    #[error("Found incompatible return types for '{name}' ({registered} vs. {declared}) for input types ({arg_types}).")]
    ReturnTypeMismatch {
        name: String,
        registered: String,
        declared: String,
        arg_types: String,
    },

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Cast from {from} to {to} is not supported")]
    UnsupportedCast { from: String, to: String },

    /// Per-row cast failure. The payload already carries the full
    /// "Cannot cast <from> '<value>' to <to>. <detail>" message, or is empty
    /// when error details are not captured.
    #[error("{0}")]
    CastFailed(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl VexelError {
    /// Whether this error is an expected domain failure rather than an
    /// internal fault. User errors may be swallowed by constant folding and
    /// converted to nulls by try semantics; system errors always propagate.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            VexelError::Internal(_) | VexelError::NotImplemented(_)
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VexelError>;

/// Result type alias for Vexel operations (alias for Result)
pub type VexelResult<T> = std::result::Result<T, VexelError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_err {
    ($msg:expr) => {
        $crate::common::error::VexelError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::VexelError::Internal(format!($fmt, $($arg)*))
    };
}

/// Macro for creating not implemented errors
#[macro_export]
macro_rules! not_implemented_err {
    ($msg:expr) => {
        $crate::common::error::VexelError::NotImplemented($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::VexelError::NotImplemented(format!($fmt, $($arg)*))
    };
}
