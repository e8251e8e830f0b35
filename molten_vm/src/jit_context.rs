//! Per-VM handle to the compilation subsystem.
//!
//! A [`JitContext`] bundles the unit cache, the call counters, and the
//! enable switch behind one cheaply clonable handle. Clones share all
//! state, so several VMs can feed a single compilation pipeline and a
//! unit compiled by one is immediately visible to the rest.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use molten_bytecode::CodeObject;
use molten_core::Value;
use molten_jit::{CacheStats, CodeCache, UnitState};
use molten_runtime::{type_id_of, FunctionObject, TypeId};

use crate::jit_bridge;

// =============================================================================
// Configuration
// =============================================================================

/// Tuning knobs for the compilation subsystem.
#[derive(Debug, Clone)]
pub struct JitConfig {
    /// Master switch. A disabled context observes calls but neither
    /// compiles nor executes templates.
    pub enabled: bool,
    /// Calls a code unit must receive before it is compiled.
    pub call_threshold: u64,
    /// Total budget for retained compiled units, in bytes.
    pub max_cache_bytes: usize,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            call_threshold: 1,
            max_cache_bytes: 64 * 1024 * 1024,
        }
    }
}

impl JitConfig {
    /// A configuration with compilation switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// A small-budget configuration for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            enabled: true,
            call_threshold: 1,
            max_cache_bytes: 1024 * 1024,
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct JitStats {
    compiled_calls: AtomicU64,
    interpreted_calls: AtomicU64,
    compilation_attempts: AtomicU64,
}

/// Point-in-time copy of the call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JitStatsSnapshot {
    /// Calls served by a compiled unit.
    pub compiled_calls: u64,
    /// Calls served by the interpreter.
    pub interpreted_calls: u64,
    /// Lowering attempts started, successful or not.
    pub compilation_attempts: u64,
}

/// Cache view of one code unit, for embedder introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeUnitReport {
    /// Whether a compiled unit currently exists for the code.
    pub compiled: bool,
    /// The unit's cache state.
    pub state: UnitState,
    /// Cache generation stamp of the compiled unit, when one exists.
    pub generation: Option<u64>,
}

// =============================================================================
// Context
// =============================================================================

/// State shared by every handle cloned from one context.
#[derive(Debug)]
struct JitShared {
    enabled: AtomicBool,
    call_threshold: u64,
    cache: CodeCache,
    stats: JitStats,
}

/// Handle to the compilation subsystem.
#[derive(Debug, Clone)]
pub struct JitContext {
    shared: Arc<JitShared>,
}

impl JitContext {
    /// Create a context from a configuration.
    #[must_use]
    pub fn new(config: JitConfig) -> Self {
        Self {
            shared: Arc::new(JitShared {
                enabled: AtomicBool::new(config.enabled),
                call_threshold: config.call_threshold,
                cache: CodeCache::new(config.max_cache_bytes),
                stats: JitStats::default(),
            }),
        }
    }

    /// Whether compilation and template execution are on.
    #[inline(always)]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    /// Switch compilation on. Idempotent.
    pub fn enable(&self) {
        self.shared.enabled.store(true, Ordering::Relaxed);
    }

    /// Switch compilation off. Idempotent. Cached units are retained
    /// while off; they resume serving calls after [`enable`].
    ///
    /// [`enable`]: JitContext::enable
    pub fn disable(&self) {
        self.shared.enabled.store(false, Ordering::Relaxed);
    }

    /// Call count a code unit must reach before it compiles.
    #[inline]
    #[must_use]
    pub fn call_threshold(&self) -> u64 {
        self.shared.call_threshold
    }

    /// The unit cache.
    pub(crate) fn cache(&self) -> &CodeCache {
        &self.shared.cache
    }

    pub(crate) fn record_compiled_call(&self) {
        self.shared
            .stats
            .compiled_calls
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_interpreted_call(&self) {
        self.shared
            .stats
            .interpreted_calls
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compilation_attempt(&self) {
        self.shared
            .stats
            .compilation_attempts
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the call counters.
    #[must_use]
    pub fn stats(&self) -> JitStatsSnapshot {
        let stats = &self.shared.stats;
        JitStatsSnapshot {
            compiled_calls: stats.compiled_calls.load(Ordering::Relaxed),
            interpreted_calls: stats.interpreted_calls.load(Ordering::Relaxed),
            compilation_attempts: stats.compilation_attempts.load(Ordering::Relaxed),
        }
    }

    /// Snapshot the cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.shared.cache.stats()
    }

    /// Number of compiled units currently cached.
    #[must_use]
    pub fn compiled_count(&self) -> usize {
        self.shared.cache.compiled_count()
    }

    /// Report the cache's view of one code unit.
    ///
    /// Reads through [`CodeCache::peek`], so asking does not perturb the
    /// hit counters.
    #[must_use]
    pub fn info(&self, code: &Arc<CodeObject>) -> CodeUnitReport {
        let code_id = jit_bridge::code_id_from_arc(code);
        let unit = self.shared.cache.peek(code_id);
        CodeUnitReport {
            compiled: unit.is_some(),
            state: self.shared.cache.state(code_id),
            generation: unit.map(|unit| unit.generation),
        }
    }

    /// Report on a callable value, when the value is a function.
    #[must_use]
    pub fn info_callable(&self, callee: Value) -> Option<CodeUnitReport> {
        let ptr = callee.as_object_ptr()?;
        // Safety: the pointer came from a live heap value, so the header
        // in front of it is valid.
        if unsafe { type_id_of(ptr) } != TypeId::FUNCTION {
            return None;
        }
        // Safety: the type id was just checked.
        let func = unsafe { &*(ptr as *const FunctionObject) };
        Some(self.info(&func.code))
    }

    /// Drop any compiled unit for `code`, forcing recompilation on the
    /// next hot call. A permanent fallback mark is not lifted; returns
    /// whether a unit was actually dropped.
    pub fn invalidate(&self, code: &Arc<CodeObject>) -> bool {
        self.shared
            .cache
            .invalidate(jit_bridge::code_id_from_arc(code))
    }

    /// Drop every compiled unit and every fallback mark.
    pub fn clear(&self) {
        self.shared.cache.clear();
    }
}

impl Default for JitContext {
    fn default() -> Self {
        Self::new(JitConfig::default())
    }
}
