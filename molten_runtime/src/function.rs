//! Function objects.
//!
//! A function object pairs a shared code unit with a calling kind. The
//! kind is a tagged variant so the call path branches exactly once to
//! decide implicit-receiver injection.

use std::fmt;
use std::sync::Arc;

use molten_bytecode::CodeObject;
use molten_core::Value;

use crate::object::{HeapObject, ObjectHeader, TypeId};

/// How a callable binds its leading argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CallKind {
    /// Plain function: the caller's visible arguments are the whole list.
    Function,
    /// Bound method: the stored receiver is injected ahead of the
    /// caller's visible arguments.
    BoundMethod {
        /// Receiver bound into the first parameter slot.
        receiver: Value,
    },
}

/// Guest function object.
///
/// Holds a strong reference to its code unit; the `Arc` pointer of that
/// code unit is the callable's stable identity.
#[repr(C)]
pub struct FunctionObject {
    /// Object header.
    pub header: ObjectHeader,
    /// Code unit this function executes.
    pub code: Arc<CodeObject>,
    /// Plain function or bound method.
    pub kind: CallKind,
}

impl FunctionObject {
    /// Create a plain function for a code unit.
    #[inline]
    pub fn new(code: Arc<CodeObject>) -> Self {
        Self {
            header: ObjectHeader::new(TypeId::FUNCTION),
            code,
            kind: CallKind::Function,
        }
    }

    /// Create a bound method for a code unit and receiver.
    ///
    /// The code unit's declared `arg_count` includes the receiver slot.
    #[inline]
    pub fn bound_method(code: Arc<CodeObject>, receiver: Value) -> Self {
        Self {
            header: ObjectHeader::new(TypeId::FUNCTION),
            code,
            kind: CallKind::BoundMethod { receiver },
        }
    }

    /// Function name for diagnostics.
    #[inline]
    pub fn name(&self) -> &str {
        self.code.name.as_str()
    }

    /// Declared parameter count of the code unit, receiver slot included.
    #[inline]
    pub fn arg_count(&self) -> u16 {
        self.code.arg_count
    }

    /// Number of arguments the caller passes at the call site.
    ///
    /// For bound methods the receiver occupies one declared slot, so the
    /// visible count is one less than the declared count.
    #[inline]
    pub fn visible_arg_count(&self) -> u16 {
        match self.kind {
            CallKind::Function => self.code.arg_count,
            CallKind::BoundMethod { .. } => self.code.arg_count.saturating_sub(1),
        }
    }

    /// Check whether this callable is a bound method.
    #[inline]
    pub fn is_bound_method(&self) -> bool {
        matches!(self.kind, CallKind::BoundMethod { .. })
    }
}

impl HeapObject for FunctionObject {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}

impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CallKind::Function => write!(f, "<function {}>", self.code.qualname),
            CallKind::BoundMethod { .. } => write!(f, "<bound method {}>", self.code.qualname),
        }
    }
}
