//! Guest list type.

use crate::object::{HeapObject, ObjectHeader, TypeId};
use molten_core::Value;

/// A mutable guest sequence.
///
/// Elements are plain `Value` words, so lists of any mix of kinds share
/// one representation. Growth is delegated to `Vec`.
#[repr(C)]
pub struct ListObject {
    /// Object header.
    pub header: ObjectHeader,
    items: Vec<Value>,
}

impl ListObject {
    /// An empty list.
    #[inline]
    pub fn new() -> Self {
        Self::from_iter(std::iter::empty())
    }

    /// Collect an iterator of values into a fresh list.
    #[inline]
    pub fn from_iter(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            header: ObjectHeader::new(TypeId::LIST),
            items: Vec::from_iter(values),
        }
    }

    /// Copy a slice of values into a fresh list.
    #[inline]
    pub fn from_slice(slice: &[Value]) -> Self {
        Self::from_iter(slice.iter().copied())
    }

    /// Element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the list holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Read the element at a guest index. Negative indices count back
    /// from the tail; out-of-range reads yield `None`.
    #[inline]
    pub fn get(&self, index: i64) -> Option<Value> {
        let at = self.resolve_index(index)?;
        Some(self.items[at])
    }

    /// Overwrite the element at a guest index, reporting whether the
    /// index was in range. Negative indices count back from the tail.
    #[inline]
    pub fn set(&mut self, index: i64, value: Value) -> bool {
        match self.resolve_index(index) {
            Some(at) => {
                self.items[at] = value;
                true
            }
            None => false,
        }
    }

    /// Append one element.
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    /// Detach and return the last element, if any.
    #[inline]
    pub fn pop(&mut self) -> Option<Value> {
        self.items.pop()
    }

    /// Borrow the elements.
    #[inline]
    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }

    /// Map a possibly-negative guest index onto the backing storage.
    fn resolve_index(&self, index: i64) -> Option<usize> {
        let len = self.items.len() as i64;
        let absolute = if index < 0 { len + index } else { index };
        (0..len).contains(&absolute).then_some(absolute as usize)
    }
}

impl Default for ListObject {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapObject for ListObject {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut ObjectHeader {
        &mut self.header
    }
}
