//! Object allocation arena.
//!
//! The heap owns every object a VM allocates and keeps it alive for the
//! VM's lifetime. Objects are boxed, so the addresses handed out stay
//! stable while the owning pool vector grows. There is no collector;
//! the whole arena drops with the VM.

use molten_core::Value;

use crate::function::FunctionObject;
use crate::list::ListObject;

/// Arena of heap objects for one VM.
///
/// Pointers returned by the `alloc_*` methods remain valid until the
/// heap is dropped; nothing is freed early.
pub struct Heap {
    lists: Vec<Box<ListObject>>,
    functions: Vec<Box<FunctionObject>>,
}

impl Heap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self {
            lists: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Allocate a list object, returning a stable pointer to it.
    #[inline]
    pub fn alloc_list(&mut self, list: ListObject) -> *mut ListObject {
        let mut boxed = Box::new(list);
        let ptr: *mut ListObject = boxed.as_mut();
        self.lists.push(boxed);
        ptr
    }

    /// Allocate a list object, returning it as a tagged value.
    #[inline]
    pub fn alloc_list_value(&mut self, list: ListObject) -> Value {
        let ptr = self.alloc_list(list);
        Value::object_ptr(ptr as *const ())
    }

    /// Allocate a function object, returning a stable pointer to it.
    #[inline]
    pub fn alloc_function(&mut self, func: FunctionObject) -> *mut FunctionObject {
        let mut boxed = Box::new(func);
        let ptr: *mut FunctionObject = boxed.as_mut();
        self.functions.push(boxed);
        ptr
    }

    /// Allocate a function object, returning it as a tagged value.
    #[inline]
    pub fn alloc_function_value(&mut self, func: FunctionObject) -> Value {
        let ptr = self.alloc_function(func);
        Value::object_ptr(ptr as *const ())
    }

    /// Total number of live objects.
    #[inline]
    pub fn object_count(&self) -> usize {
        self.lists.len() + self.functions.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
