//! Object headers and type identification.
//!
//! Every heap object starts with an [`ObjectHeader`] so the VM can
//! discriminate object types in O(1) through an untyped pointer.

use std::fmt;

// =============================================================================
// Type identifiers
// =============================================================================

/// Small integer naming a value's runtime type.
///
/// One word, no vtable or pointer chase. Immediate kinds (none, bool,
/// int, float, str) get IDs alongside the heap kinds so diagnostics can
/// name any value's type through the same table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    /// The `None` singleton.
    pub const NONE: Self = Self(0);
    /// Booleans.
    pub const BOOL: Self = Self(1);
    /// Small integers.
    pub const INT: Self = Self(2);
    /// Floats.
    pub const FLOAT: Self = Self(3);
    /// Interned strings.
    pub const STR: Self = Self(4);
    /// List objects.
    pub const LIST: Self = Self(5);
    /// Function objects (plain or bound).
    pub const FUNCTION: Self = Self(6);

    /// The wrapped integer.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Wrap an integer as a type id.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Guest-visible name of this type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NONE => "NoneType",
            Self::BOOL => "bool",
            Self::INT => "int",
            Self::FLOAT => "float",
            Self::STR => "str",
            Self::LIST => "list",
            Self::FUNCTION => "function",
            _ => "<unknown>",
        }
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({} = {})", self.name(), self.0)
    }
}

// =============================================================================
// Headers
// =============================================================================

/// Header stored at offset 0 of every heap object.
///
/// All object structs are `#[repr(C)]` with the header as their first
/// field, so the type id can be read through a `*const ()` before the
/// pointer is cast to a concrete object type.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Type of the object this header belongs to.
    pub type_id: TypeId,
}

impl ObjectHeader {
    /// A header naming the given type.
    #[inline]
    pub const fn new(type_id: TypeId) -> Self {
        Self { type_id }
    }
}

/// Common surface of every heap object type.
pub trait HeapObject {
    /// Borrow the header.
    fn header(&self) -> &ObjectHeader;

    /// Borrow the header mutably.
    fn header_mut(&mut self) -> &mut ObjectHeader;

    /// The object's type id.
    #[inline]
    fn type_id(&self) -> TypeId {
        self.header().type_id
    }
}

/// Read the type id behind an untyped object pointer.
///
/// # Safety
///
/// `ptr` must point to a live heap object whose layout starts with an
/// [`ObjectHeader`] (true for every object type in this crate).
#[inline(always)]
pub unsafe fn type_id_of(ptr: *const ()) -> TypeId {
    let header_ptr = ptr as *const ObjectHeader;
    unsafe { (*header_ptr).type_id }
}
