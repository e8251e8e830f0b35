//! Cache of compiled units keyed by code identity.
//!
//! The cache provides:
//! - O(1) lookup of compiled units by code id
//! - the per-identity compilation state machine
//!   (uncompiled, in flight, compiled, permanent fallback)
//! - at-most-one in-flight compilation per identity via claims
//! - a byte budget with eviction of committed units
//! - statistics and debugging support

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{JitError, JitResult};
use crate::template::CompiledUnit;

// =============================================================================
// Slots and Claims
// =============================================================================

/// Per-identity cache slot.
///
/// Absence of a slot means the identity is uncompiled.
#[derive(Debug, Clone)]
enum CacheSlot {
    /// One thread holds the claim and is compiling.
    InFlight,
    /// A committed unit, ready to execute.
    Ready(Arc<CompiledUnit>),
    /// The emitter failed permanently; never try again.
    Fallback,
}

/// Outcome of [`CodeCache::claim`].
#[derive(Debug, Clone)]
pub enum Claim {
    /// The caller now owns compilation for this identity and must finish
    /// with [`CodeCache::fill`] or [`CodeCache::fail_permanent`].
    Acquired,
    /// Another thread is compiling this identity right now.
    Busy,
    /// A committed unit already exists.
    Ready(Arc<CompiledUnit>),
    /// The identity is permanently non-compilable.
    Fallback,
}

/// Externally visible compilation state of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// No committed unit. Also reported while a compile is in flight.
    Uncompiled,
    /// A committed unit is cached and would be used by the next call.
    Compiled,
    /// The emitter rejected this identity; it stays interpreted.
    PermanentFallback,
}

// =============================================================================
// Code Cache
// =============================================================================

/// Slot table plus the byte accounting it must stay consistent with.
#[derive(Debug)]
struct SlotTable {
    slots: FxHashMap<u64, CacheSlot>,
    /// Bytes held by Ready slots only.
    total_bytes: usize,
}

/// A cache of compiled units.
///
/// Thread-safe via internal locking; shared behind `Arc` by every VM
/// attached to one JIT context.
#[derive(Debug)]
pub struct CodeCache {
    table: RwLock<SlotTable>,
    /// Maximum total size of committed units.
    max_bytes: usize,
    /// Monotonic stamp for committed units.
    generations: AtomicU64,
    /// Hits recorded by `lookup`.
    hits: AtomicU64,
    /// Misses recorded by `lookup`.
    misses: AtomicU64,
    /// Commit counter.
    insertions: AtomicU64,
    /// Eviction counter.
    evictions: AtomicU64,
    /// Permanent emitter rejections.
    permanent_fallbacks: AtomicU64,
    /// Units rejected for exceeding the budget.
    resource_rejections: AtomicU64,
}

impl CodeCache {
    /// Create a cache with the given byte budget for committed units.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            table: RwLock::new(SlotTable {
                slots: FxHashMap::default(),
                total_bytes: 0,
            }),
            max_bytes,
            generations: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            permanent_fallbacks: AtomicU64::new(0),
            resource_rejections: AtomicU64::new(0),
        }
    }

    /// Look up a committed unit on the call path.
    ///
    /// Counts a hit or miss; use [`CodeCache::peek`] for reads that must
    /// not skew statistics.
    #[inline]
    pub fn lookup(&self, code_id: u64) -> Option<Arc<CompiledUnit>> {
        let result = self.peek(code_id);
        let counter = if result.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Look up a committed unit without touching statistics.
    #[inline]
    pub fn peek(&self, code_id: u64) -> Option<Arc<CompiledUnit>> {
        let table = self.table.read();
        match table.slots.get(&code_id) {
            Some(CacheSlot::Ready(unit)) => Some(Arc::clone(unit)),
            _ => None,
        }
    }

    /// Current state of an identity.
    pub fn state(&self, code_id: u64) -> UnitState {
        let table = self.table.read();
        match table.slots.get(&code_id) {
            Some(CacheSlot::Ready(_)) => UnitState::Compiled,
            Some(CacheSlot::Fallback) => UnitState::PermanentFallback,
            Some(CacheSlot::InFlight) | None => UnitState::Uncompiled,
        }
    }

    /// Try to acquire the right to compile an identity.
    ///
    /// At most one caller holds the claim at a time. A caller that gets
    /// [`Claim::Acquired`] must finish with [`CodeCache::fill`] or
    /// [`CodeCache::fail_permanent`]; all other outcomes carry the
    /// information needed to proceed without compiling.
    pub fn claim(&self, code_id: u64) -> Claim {
        let mut table = self.table.write();
        match table.slots.get(&code_id) {
            Some(CacheSlot::InFlight) => Claim::Busy,
            Some(CacheSlot::Ready(unit)) => Claim::Ready(Arc::clone(unit)),
            Some(CacheSlot::Fallback) => Claim::Fallback,
            None => {
                table.slots.insert(code_id, CacheSlot::InFlight);
                Claim::Acquired
            }
        }
    }

    /// Commit a freshly compiled unit, consuming the caller's claim.
    ///
    /// Stamps the unit's generation, evicts committed units until the
    /// budget fits, and publishes the unit for lookup. A unit larger
    /// than the whole budget is rejected with `ResourceExhausted`; the
    /// claim is released so the identity returns to uncompiled and a
    /// later call may retry.
    pub fn fill(&self, mut unit: CompiledUnit) -> JitResult<Arc<CompiledUnit>> {
        let code_id = unit.code_id;
        let size = unit.size_bytes;

        let mut table = self.table.write();
        debug_assert!(
            matches!(table.slots.get(&code_id), Some(CacheSlot::InFlight)),
            "fill without a held claim"
        );

        if size > self.max_bytes {
            table.slots.remove(&code_id);
            self.resource_rejections.fetch_add(1, Ordering::Relaxed);
            return Err(JitError::resource_exhausted(size, self.max_bytes));
        }

        // Evict committed units until the new one fits. In-flight claims
        // and fallback verdicts are never evicted.
        while table.total_bytes + size > self.max_bytes {
            let victim_id = table
                .slots
                .iter()
                .find(|(id, slot)| matches!(slot, CacheSlot::Ready(_)) && **id != code_id)
                .map(|(id, _)| *id);
            match victim_id {
                Some(victim_id) => {
                    if let Some(CacheSlot::Ready(victim)) = table.slots.remove(&victim_id) {
                        table.total_bytes = table.total_bytes.saturating_sub(victim.size_bytes);
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => break,
            }
        }

        unit.generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let unit = Arc::new(unit);
        table.slots.insert(code_id, CacheSlot::Ready(Arc::clone(&unit)));
        table.total_bytes += size;
        self.insertions.fetch_add(1, Ordering::Relaxed);

        Ok(unit)
    }

    /// Record a permanent emitter failure, consuming the caller's claim.
    ///
    /// The identity will never be compiled again for its lifetime;
    /// only [`CodeCache::clear`] resets the verdict.
    pub fn fail_permanent(&self, code_id: u64) {
        let mut table = self.table.write();
        table.slots.insert(code_id, CacheSlot::Fallback);
        self.permanent_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop a committed unit, returning the identity to uncompiled.
    ///
    /// Returns true if a unit was dropped. Fallback verdicts are
    /// terminal and stay; an in-flight compile is left to finish.
    pub fn invalidate(&self, code_id: u64) -> bool {
        let mut table = self.table.write();
        match table.slots.get(&code_id) {
            Some(CacheSlot::Ready(unit)) => {
                let size = unit.size_bytes;
                table.slots.remove(&code_id);
                table.total_bytes = table.total_bytes.saturating_sub(size);
                true
            }
            _ => false,
        }
    }

    /// Wipe every slot, fallback verdicts included.
    ///
    /// The generation counter keeps rising, so units committed after a
    /// clear always outrank anything committed before it.
    pub fn clear(&self) {
        let mut table = self.table.write();
        table.slots.clear();
        table.total_bytes = 0;
    }

    /// Number of committed units.
    #[inline]
    pub fn compiled_count(&self) -> usize {
        let table = self.table.read();
        table
            .slots
            .values()
            .filter(|slot| matches!(slot, CacheSlot::Ready(_)))
            .count()
    }

    /// Total size of committed units in bytes.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.table.read().total_bytes
    }

    /// The configured byte budget.
    #[inline]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// The generation stamp of the most recent commit.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generations.load(Ordering::Relaxed)
    }

    /// Snapshot of the cache counters.
    #[inline]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            permanent_fallbacks: self.permanent_fallbacks.load(Ordering::Relaxed),
            resource_rejections: self.resource_rejections.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counter snapshot for the code cache.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Number of lookup hits.
    pub hits: u64,
    /// Number of lookup misses.
    pub misses: u64,
    /// Number of committed units.
    pub insertions: u64,
    /// Number of evicted units.
    pub evictions: u64,
    /// Number of identities marked permanently non-compilable.
    pub permanent_fallbacks: u64,
    /// Number of units rejected for exceeding the budget.
    pub resource_rejections: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, in `0.0..=1.0`.
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
