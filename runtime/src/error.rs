/*!
Error types for the interop runtime

These cover recoverable failures on the Rust side of the boundary (bad
configuration values, out-of-range ordinals). Failures that must reach a
foreign caller travel inside an error envelope instead, see `result`.
*/

use crate::result::BoundaryError;

/// Errors that can occur while interpreting values handed to the runtime
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteropError {
    /// Severity ordinal outside the published `0..=4` range
    #[error("severity ordinal {0} is outside 0..=4")]
    InvalidSeverity(i32),

    /// Severity name that matches no level
    #[error("unknown severity name: {0:?}")]
    UnknownSeverity(String),
}

/// Result type for runtime operations
pub type InteropResult<T> = Result<T, InteropError>;

impl BoundaryError for InteropError {
    fn code(&self) -> i32 {
        match self {
            InteropError::InvalidSeverity(_) => 1,
            InteropError::UnknownSeverity(_) => 2,
        }
    }
}
