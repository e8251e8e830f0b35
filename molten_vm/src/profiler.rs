//! Per-VM call counting.
//!
//! Each VM counts activations per code unit and hands the running count
//! to the call adapter, which compares it against the context's
//! compilation threshold. Counts are VM-local; the shared cache, not the
//! counter, is what makes a compiled unit visible to sibling VMs.

use rustc_hash::FxHashMap;

/// Identity of a code unit, taken from the address of its shared
/// allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeId(pub u64);

impl CodeId {
    /// Identity for a code unit behind an `Arc`.
    #[inline]
    pub fn from_ptr(ptr: *const ()) -> Self {
        Self(ptr as u64)
    }
}

/// Call counters for every code unit this VM has activated.
#[derive(Debug, Default)]
pub struct Profiler {
    calls: FxHashMap<CodeId, u64>,
}

impl Profiler {
    /// A profiler with no recorded calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one activation and return the updated total, starting at 1
    /// for the first call.
    #[inline]
    pub fn record_call(&mut self, id: CodeId) -> u64 {
        let total = self.calls.entry(id).or_default();
        *total += 1;
        *total
    }

    /// Observed activation count for a code unit, 0 when never called.
    #[inline]
    pub fn call_count(&self, id: CodeId) -> u64 {
        self.calls.get(&id).copied().unwrap_or_default()
    }
}
