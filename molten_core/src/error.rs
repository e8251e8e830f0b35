//! Value-level error definitions.

use thiserror::Error;

/// Result alias for core value operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Failures producing core values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An integer does not fit the 48-bit immediate range.
    #[error("integer {value} out of range for immediate encoding")]
    IntOutOfRange {
        /// The offending integer.
        value: i64,
    },
}
