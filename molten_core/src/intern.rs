//! String interning with pointer-identity handles.
//!
//! The interner stores one canonical copy of each distinct string and hands
//! out cheap handles. Handle equality is pointer equality, so name lookups
//! and map keys cost one comparison regardless of string length. A second
//! index keyed by data pointer lets NaN-boxed string payloads resolve back
//! to their handle.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Handle to an interned string.
///
/// Two handles compare equal iff they came from the same interner entry;
/// content comparison never runs on the hot path.
#[derive(Clone)]
pub struct InternedString {
    inner: Arc<str>,
}

impl InternedString {
    #[inline]
    fn new(s: Arc<str>) -> Self {
        Self { inner: s }
    }

    /// The string content.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Byte length.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True for the empty string.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    fn ptr(&self) -> *const u8 {
        self.inner.as_ptr()
    }

    /// Clone the underlying `Arc`.
    ///
    /// Bumps the refcount of the canonical allocation, keeping the data
    /// pointer stable for NaN-boxed payloads.
    #[inline]
    #[must_use]
    pub fn get_arc(&self) -> Arc<str> {
        self.inner.clone()
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for InternedString {}

impl Hash for InternedString {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Pointer hash, matching the pointer Eq.
        self.ptr().hash(state);
    }
}

impl std::ops::Deref for InternedString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

// Content comparison against plain strings is fine off the hot path.
impl PartialEq<&str> for InternedString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<String> for InternedString {
    fn eq(&self, other: &String) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InternedString").field(&self.as_str()).finish()
    }
}

/// Interner state behind the lock.
///
/// `by_content` is the canonical dedup map; `by_addr` maps the data pointer
/// back to the handle for NaN-boxed payload decoding.
struct InternTables {
    by_content: FxHashMap<Arc<str>, InternedString>,
    by_addr: FxHashMap<usize, InternedString>,
}

impl InternTables {
    #[inline]
    fn new() -> Self {
        Self {
            by_content: FxHashMap::default(),
            by_addr: FxHashMap::default(),
        }
    }

    #[inline]
    fn with_capacity(capacity: usize) -> Self {
        Self {
            by_content: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            by_addr: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    fn insert_new(&mut self, arc: Arc<str>) -> InternedString {
        let handle = InternedString::new(arc.clone());
        self.by_addr.insert(handle.ptr() as usize, handle.clone());
        self.by_content.insert(arc, handle.clone());
        handle
    }
}

/// Thread-safe string interner.
pub struct StringInterner {
    tables: RwLock<InternTables>,
}

impl StringInterner {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(InternTables::new()),
        }
    }

    /// Create an interner with preallocated table capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tables: RwLock::new(InternTables::with_capacity(capacity)),
        }
    }

    /// Intern a string, returning the canonical handle.
    ///
    /// Repeated interning of equal content returns the same handle.
    pub fn intern(&self, s: &str) -> InternedString {
        {
            let tables = self.tables.read();
            if let Some(handle) = tables.by_content.get(s) {
                return handle.clone();
            }
        }

        let mut tables = self.tables.write();
        // Another thread may have inserted between the two locks.
        if let Some(handle) = tables.by_content.get(s) {
            return handle.clone();
        }
        tables.insert_new(s.into())
    }

    /// Intern an owned string, reusing its allocation when the content is new.
    pub fn intern_owned(&self, s: String) -> InternedString {
        {
            let tables = self.tables.read();
            if let Some(handle) = tables.by_content.get(s.as_str()) {
                return handle.clone();
            }
        }

        let mut tables = self.tables.write();
        if let Some(handle) = tables.by_content.get(s.as_str()) {
            return handle.clone();
        }
        tables.insert_new(s.into())
    }

    /// Look up an existing handle without interning.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<InternedString> {
        self.tables.read().by_content.get(s).cloned()
    }

    /// Resolve a handle from its data pointer.
    ///
    /// Used to decode NaN-boxed string payloads.
    #[must_use]
    pub fn get_by_ptr(&self, ptr: *const u8) -> Option<InternedString> {
        self.tables.read().by_addr.get(&(ptr as usize)).cloned()
    }

    /// Byte length of the entry at a data pointer, if present.
    #[must_use]
    pub fn len_by_ptr(&self, ptr: *const u8) -> Option<usize> {
        self.tables
            .read()
            .by_addr
            .get(&(ptr as usize))
            .map(InternedString::len)
    }

    /// True if the content has been interned.
    #[must_use]
    pub fn contains(&self, s: &str) -> bool {
        self.tables.read().by_content.contains_key(s)
    }

    /// Number of distinct entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().by_content.len()
    }

    /// True when no entries exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.read().by_content.is_empty()
    }

    /// Drop all entries.
    ///
    /// Outstanding handles stay valid but no longer deduplicate against
    /// future interning.
    pub fn clear(&self) {
        let mut tables = self.tables.write();
        tables.by_content.clear();
        tables.by_addr.clear();
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("StringInterner")
            .field("count", &tables.by_content.len())
            .finish()
    }
}

/// Process-wide interner shared by code objects, globals and boxed strings.
pub static GLOBAL_INTERNER: std::sync::LazyLock<StringInterner> =
    std::sync::LazyLock::new(StringInterner::new);

/// Intern through the global interner.
#[inline]
pub fn intern(s: &str) -> InternedString {
    GLOBAL_INTERNER.intern(s)
}

/// Intern an owned string through the global interner.
#[inline]
pub fn intern_owned(s: String) -> InternedString {
    GLOBAL_INTERNER.intern_owned(s)
}

/// Resolve a NaN-boxed string payload to its handle.
#[inline]
pub fn interned_by_ptr(ptr: *const u8) -> Option<InternedString> {
    GLOBAL_INTERNER.get_by_ptr(ptr)
}

/// Resolve a NaN-boxed string payload to its byte length.
#[inline]
pub fn interned_len_by_ptr(ptr: *const u8) -> Option<usize> {
    GLOBAL_INTERNER.len_by_ptr(ptr)
}
