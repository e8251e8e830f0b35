//! Glue between the call adapter and the compilation pipeline.
//!
//! The adapter asks one question per call: is there a compiled unit for
//! this code? [`unit_for_call`] answers it, compiling on the spot when
//! the unit is hot and nobody else already holds the claim. Losing a
//! claim race is not an error; the loser interprets this call and picks
//! the unit up next time.

use std::sync::Arc;

use molten_bytecode::CodeObject;
use molten_jit::{Claim, CompiledUnit};

use crate::jit_context::JitContext;
use crate::lowering;

/// Stable identity of a code unit: the address of its shared allocation.
///
/// Rebuilding a function from source yields a new allocation and thus a
/// new identity, which is exactly the invalidation boundary we want.
#[inline]
pub(crate) fn code_id_from_arc(code: &Arc<CodeObject>) -> u64 {
    Arc::as_ptr(code) as usize as u64
}

/// Resolve a compiled unit for a call.
///
/// Returns `None` whenever this call should interpret instead: the
/// context is off, the unit is cold, someone else is compiling it, it
/// fell back permanently, or it did not fit the cache.
pub(crate) fn unit_for_call(
    jit: &JitContext,
    code: &Arc<CodeObject>,
    call_count: u64,
) -> Option<Arc<CompiledUnit>> {
    if !jit.is_enabled() {
        return None;
    }

    let code_id = code_id_from_arc(code);
    let cache = jit.cache();
    if let Some(unit) = cache.lookup(code_id) {
        return Some(unit);
    }
    if call_count < jit.call_threshold() {
        return None;
    }

    match cache.claim(code_id) {
        Claim::Ready(unit) => Some(unit),
        Claim::Busy | Claim::Fallback => None,
        Claim::Acquired => {
            jit.record_compilation_attempt();
            match lowering::lower_code_to_unit(code_id, code) {
                // An oversized unit is dropped by fill(), which releases
                // the claim; the unit stays uncompiled and may retry.
                Ok(unit) => cache.fill(unit).ok(),
                Err(_) => {
                    // Lowering failures are structural. The unit will
                    // never compile, so stop trying for good.
                    cache.fail_permanent(code_id);
                    None
                }
            }
        }
    }
}
