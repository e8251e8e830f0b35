//! Heap object model for the Molten virtual machine.
//!
//! Every heap object is `#[repr(C)]` with an [`ObjectHeader`] as its
//! first field, so the VM discriminates object types in O(1) by reading
//! the header through an untyped pointer. The [`Heap`] arena owns all
//! allocations for a VM's lifetime and hands out stable pointers.
//!
//! # Key Types
//!
//! - [`ObjectHeader`] / [`TypeId`]: type sniffing through `*const ()`
//! - [`ListObject`]: mutable guest sequence
//! - [`FunctionObject`] / [`CallKind`]: callables, plain or receiver-bound
//! - [`Heap`]: owning arena

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod function;
pub mod heap;
pub mod list;
pub mod object;

// Re-export main types
pub use function::{CallKind, FunctionObject};
pub use heap::Heap;
pub use list::ListObject;
pub use object::{type_id_of, HeapObject, ObjectHeader, TypeId};
