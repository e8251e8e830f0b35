//! Guest-facing runtime errors.
//!
//! Raised during bytecode execution and rendered in the guest's message
//! style. Message text lives behind `Arc<str>` so cloning an error on the
//! unwind path never copies the string.

use std::fmt;
use std::sync::Arc;

use molten_jit::JitError;

/// An error raised while guest code is running.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    /// Which error, with its payload.
    pub kind: RuntimeErrorKind,
}

/// Specific runtime error types.
#[derive(Debug, Clone)]
pub enum RuntimeErrorKind {
    /// An operation was applied to a value of the wrong type.
    TypeError {
        /// Error description.
        message: Arc<str>,
    },
    /// A binary operator rejected its operand type pair.
    UnsupportedOperandTypes {
        /// Operator symbol.
        op: &'static str,
        /// Left operand type name.
        left: Arc<str>,
        /// Right operand type name.
        right: Arc<str>,
    },
    /// Call target is not a function.
    NotCallable {
        /// Type name of the non-callable value.
        type_name: Arc<str>,
    },
    /// Lookup of an unbound global name.
    NameError {
        /// The undefined name.
        name: Arc<str>,
    },
    /// Integer division or modulo with a zero divisor.
    ZeroDivisionError,
    /// Call stack exceeded the depth limit.
    RecursionError {
        /// Depth at which the limit tripped.
        depth: usize,
    },
    /// An instruction byte no handler claims.
    InvalidOpcode {
        /// The raw opcode byte.
        opcode: u8,
    },
    /// VM invariant violation. Reaching this is a host bug.
    InternalError {
        /// Error description.
        message: Arc<str>,
    },
}

impl RuntimeError {
    /// Wrap a kind.
    #[inline]
    pub fn new(kind: RuntimeErrorKind) -> Self {
        Self { kind }
    }

    // =========================================================================
    // Convenience Constructors
    // =========================================================================

    /// TypeError with a preformatted message.
    #[inline]
    pub fn type_error(message: impl Into<Arc<str>>) -> Self {
        Self::new(RuntimeErrorKind::TypeError { message: message.into() })
    }

    /// TypeError for a binary operator applied to unsupported types.
    #[inline]
    pub fn unsupported_operand(op: &'static str, left: &str, right: &str) -> Self {
        Self::new(RuntimeErrorKind::UnsupportedOperandTypes {
            op,
            left: left.into(),
            right: right.into(),
        })
    }

    /// TypeError for calling a non-callable value.
    #[inline]
    pub fn not_callable(type_name: impl Into<Arc<str>>) -> Self {
        Self::new(RuntimeErrorKind::NotCallable { type_name: type_name.into() })
    }

    /// NameError for an undefined global.
    #[inline]
    pub fn name_error(name: impl Into<Arc<str>>) -> Self {
        Self::new(RuntimeErrorKind::NameError { name: name.into() })
    }

    /// ZeroDivisionError.
    #[inline]
    pub fn zero_division() -> Self {
        Self::new(RuntimeErrorKind::ZeroDivisionError)
    }

    /// RecursionError at the given call depth.
    #[inline]
    pub fn recursion_error(depth: usize) -> Self {
        Self::new(RuntimeErrorKind::RecursionError { depth })
    }

    /// InternalError for an undecodable opcode byte.
    #[inline]
    pub fn invalid_opcode(opcode: u8) -> Self {
        Self::new(RuntimeErrorKind::InvalidOpcode { opcode })
    }

    /// InternalError with a description.
    #[inline]
    pub fn internal(message: impl Into<Arc<str>>) -> Self {
        Self::new(RuntimeErrorKind::InternalError { message: message.into() })
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RuntimeErrorKind::*;

        match &self.kind {
            TypeError { message } => write!(f, "TypeError: {message}"),
            UnsupportedOperandTypes { op, left, right } => write!(
                f,
                "TypeError: unsupported operand type(s) for {op}: '{left}' and '{right}'"
            ),
            NotCallable { type_name } => {
                write!(f, "TypeError: '{type_name}' object is not callable")
            }
            NameError { name } => write!(f, "NameError: name '{name}' is not defined"),
            ZeroDivisionError => f.write_str("ZeroDivisionError: division by zero"),
            RecursionError { depth } => write!(
                f,
                "RecursionError: maximum recursion depth exceeded ({depth})"
            ),
            InvalidOpcode { opcode } => write!(f, "InternalError: invalid opcode {opcode:#04x}"),
            InternalError { message } => write!(f, "InternalError: {message}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<JitError> for RuntimeError {
    /// Translate a backend error into a guest error.
    ///
    /// Only `ArityMismatch` reaches guest code in practice; the call
    /// adapter recovers every other backend failure by interpreting.
    fn from(err: JitError) -> Self {
        match err {
            JitError::ArityMismatch {
                callable,
                expected,
                supplied,
            } => Self::type_error(format!(
                "{}() takes {} positional argument{} but {} {} given",
                callable,
                expected,
                if expected == 1 { "" } else { "s" },
                supplied,
                if supplied == 1 { "was" } else { "were" }
            )),
            other => Self::internal(other.to_string()),
        }
    }
}

/// Alias for fallible VM operations.
pub type VmResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_prefixes_message() {
        let err = RuntimeError::type_error("cannot negate 'str'");
        assert_eq!(err.to_string(), "TypeError: cannot negate 'str'");
    }

    #[test]
    fn test_unsupported_operand_names_both_sides() {
        let err = RuntimeError::unsupported_operand("%", "str", "list");
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported operand type(s) for %: 'str' and 'list'"
        );
    }

    #[test]
    fn test_name_error_quotes_the_name() {
        let err = RuntimeError::name_error("missing_fn");
        assert_eq!(err.to_string(), "NameError: name 'missing_fn' is not defined");
    }

    #[test]
    fn test_zero_division_message_is_fixed() {
        assert_eq!(
            RuntimeError::zero_division().to_string(),
            "ZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn test_invalid_opcode_renders_hex() {
        let err = RuntimeError::invalid_opcode(0xAB);
        assert!(err.to_string().contains("0xab"));
    }

    #[test]
    fn test_recursion_error_carries_depth() {
        let err = RuntimeError::recursion_error(64);
        assert!(err.to_string().contains("(64)"));
        match err.kind {
            RuntimeErrorKind::RecursionError { depth } => assert_eq!(depth, 64),
            _ => panic!("Expected RecursionError"),
        }
    }

    #[test]
    fn test_clone_shares_message_storage() {
        let a = RuntimeError::type_error(String::from("shared text"));
        let b = a.clone();
        let text_ptr = |e: &RuntimeError| match &e.kind {
            RuntimeErrorKind::TypeError { message } => Arc::as_ptr(message),
            _ => panic!("Expected TypeError"),
        };
        assert_eq!(text_ptr(&a), text_ptr(&b));
    }

    #[test]
    fn test_arity_mismatch_message_plural() {
        let err: RuntimeError = JitError::arity_mismatch("arg3", 3, 5).into();
        assert_eq!(
            err.to_string(),
            "TypeError: arg3() takes 3 positional arguments but 5 were given"
        );
    }

    #[test]
    fn test_arity_mismatch_message_singular() {
        let err: RuntimeError = JitError::arity_mismatch("ident", 2, 1).into();
        assert_eq!(
            err.to_string(),
            "TypeError: ident() takes 2 positional arguments but 1 was given"
        );

        let err: RuntimeError = JitError::arity_mismatch("ident", 1, 0).into();
        assert_eq!(
            err.to_string(),
            "TypeError: ident() takes 1 positional argument but 0 were given"
        );
    }

    #[test]
    fn test_backend_errors_fold_to_internal() {
        let err: RuntimeError =
            JitError::malformed("invalid jump target at instruction 4").into();
        assert!(matches!(err.kind, RuntimeErrorKind::InternalError { .. }));
        assert!(err.to_string().contains("invalid jump target"));
    }
}
