//! Error types for the compilation backend.
//!
//! Compilation failures never abort the process: the caller recovers by
//! interpreting, and (for emitter failures) records the code unit as
//! permanently non-compilable. Only argument-count mismatches surface to
//! guest code, translated by the VM into its standard TypeError.

use molten_bytecode::Opcode;
use thiserror::Error;

/// The result type used throughout the compilation backend.
pub type JitResult<T> = Result<T, JitError>;

/// Errors produced while compiling a code unit or committing its
/// compiled form to the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JitError {
    /// Caller and callee disagree on argument count.
    ///
    /// Detected by the call adapter before compilation is ever consulted;
    /// a mismatched call never reaches the emitter.
    #[error("{callable}() expects {expected} arguments but {supplied} were supplied")]
    ArityMismatch {
        /// Name of the callable, for the guest-facing message.
        callable: String,
        /// Declared parameter count of the code unit.
        expected: u16,
        /// Argument count the caller provided.
        supplied: usize,
    },

    /// The emitter cannot lower an opcode; the code unit stays
    /// interpreted permanently.
    #[error("unsupported opcode {op:?} at bytecode offset {offset}")]
    UnsupportedOperation {
        /// The opcode the emitter cannot lower.
        op: Opcode,
        /// Instruction index within the code unit.
        offset: usize,
    },

    /// A compiled unit did not fit the cache budget. The code unit stays
    /// uncompiled and a later call may retry.
    #[error("compiled unit of {requested} bytes exceeds cache budget of {budget} bytes")]
    ResourceExhausted {
        /// Size of the rejected unit in bytes.
        requested: usize,
        /// Configured cache budget in bytes.
        budget: usize,
    },

    /// The instruction stream itself is invalid (bad opcode byte, bad
    /// constant index, jump out of range).
    #[error("malformed bytecode: {message}")]
    Malformed {
        /// Description of the defect.
        message: String,
    },
}

impl JitError {
    /// Create an arity mismatch error.
    #[must_use]
    pub fn arity_mismatch(callable: impl Into<String>, expected: u16, supplied: usize) -> Self {
        Self::ArityMismatch {
            callable: callable.into(),
            expected,
            supplied,
        }
    }

    /// Create an unsupported-operation error.
    #[must_use]
    pub fn unsupported(op: Opcode, offset: usize) -> Self {
        Self::UnsupportedOperation { op, offset }
    }

    /// Create a resource-exhausted error.
    #[must_use]
    pub fn resource_exhausted(requested: usize, budget: usize) -> Self {
        Self::ResourceExhausted { requested, budget }
    }

    /// Create a malformed-bytecode error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Whether this failure permanently disqualifies the code unit.
    ///
    /// Emitter failures are permanent; resource failures are retryable
    /// once the cache has room.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperation { .. } | Self::Malformed { .. }
        )
    }
}
